//! Chat log listing and access rules.

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

use crate::store::{Account, ChatLogFilter};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query string accepted by `GET /api/chatlogs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search_term: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatLogError {
    #[error("invalid date {0:?}: expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),
    #[error("chat log not found")]
    NotFound,
    #[error("not allowed to access this chat log")]
    Forbidden,
}

enum Bound {
    Start,
    End,
}

/// Parse a date bound. A bare date covers the whole day: `from` starts at
/// midnight and `to` ends at the last instant of that day.
fn parse_bound(raw: &str, bound: Bound) -> Result<OffsetDateTime, ChatLogError> {
    let raw = raw.trim();
    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(at);
    }
    let date = Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ChatLogError::InvalidDate(raw.to_owned()))?;
    let time = match bound {
        Bound::Start => Time::MIDNIGHT,
        Bound::End => Time::from_hms_nano(23, 59, 59, 999_999_999).map_err(|_| ChatLogError::InvalidDate(raw.to_owned()))?,
    };
    Ok(date.with_time(time).assume_utc())
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

impl ChatLogParams {
    /// # Errors
    ///
    /// Returns an error when a date bound cannot be parsed.
    pub fn into_filter(self) -> Result<ChatLogFilter, ChatLogError> {
        let created_from = non_blank(self.date_from)
            .map(|raw| parse_bound(&raw, Bound::Start))
            .transpose()?;
        let created_to = non_blank(self.date_to)
            .map(|raw| parse_bound(&raw, Bound::End))
            .transpose()?;
        Ok(ChatLogFilter {
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            search_term: non_blank(self.search_term),
            owner_id: non_blank(self.user_id),
            owner_email: non_blank(self.user_email),
            created_from,
            created_to,
        })
    }
}

/// A single log is visible to its owner and to admins.
///
/// # Errors
///
/// Returns [`ChatLogError::Forbidden`] for anyone else.
pub fn authorize_single(account: &Account, session_id: &str, is_admin: bool) -> Result<(), ChatLogError> {
    if is_admin || super::ask::session_id_for(account) == session_id {
        Ok(())
    } else {
        Err(ChatLogError::Forbidden)
    }
}

#[cfg(test)]
#[path = "chatlog_test.rs"]
mod tests;
