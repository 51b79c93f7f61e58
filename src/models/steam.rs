// ============================================================================
// Steam Web API Types
// ============================================================================

use serde::Deserialize;

use super::{Item, ItemId, MemberId};

/// Response from ISteamUser/GetFriendList
#[derive(Debug, Clone, Deserialize)]
pub struct ApiFriendListResponse {
    #[serde(default)]
    pub friendslist: Option<ApiFriendList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFriendList {
    #[serde(default)]
    pub friends: Vec<ApiFriend>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFriend {
    pub steamid: String,
    #[serde(default)]
    pub relationship: Option<String>,
}

impl From<ApiFriend> for MemberId {
    fn from(friend: ApiFriend) -> Self {
        MemberId(friend.steamid)
    }
}

/// Response wrapper shared by the IPlayerService game endpoints
///
/// Private profiles come back as `{"response": {}}`, so every field defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiGamesResponse {
    #[serde(default)]
    pub response: ApiGames,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiGames {
    #[serde(default)]
    pub games: Vec<ApiGame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiGame {
    pub appid: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub playtime_forever: u64,
}

impl From<ApiGame> for Item {
    fn from(game: ApiGame) -> Self {
        Item {
            id: ItemId(game.appid),
            name: game.name,
            playtime_minutes: game.playtime_forever,
        }
    }
}

impl ApiFriendListResponse {
    /// Friends in the order Steam returned them, skipping non-friend relationships
    pub fn into_members(self) -> Vec<MemberId> {
        self.friendslist
            .map(|list| list.friends)
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f.relationship.as_deref().map_or(true, |r| r == "friend"))
            .map(MemberId::from)
            .collect()
    }
}

impl ApiGamesResponse {
    pub fn into_items(self) -> Vec<Item> {
        self.response.games.into_iter().map(Item::from).collect()
    }
}
