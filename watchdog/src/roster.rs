//! Player roster extraction from `listplayers` output

/// Command that lists connected players.
pub const LIST_PLAYERS_COMMAND: &str = "listplayers";

/// Text the server returns instead of a list when nobody is online.
pub const NO_PLAYERS_SENTINEL: &str = "No Players Connected";

/// Splits a `listplayers` response into one entry per player, in order.
///
/// The sentinel yields an empty roster rather than a one-entry list.
pub fn parse_roster(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    if trimmed == NO_PLAYERS_SENTINEL {
        return Vec::new();
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
