use crate::client::status::RequestStatus;
use crate::wire::{ErrorType, UserSummary, UsersQuery, DEFAULT_PAGE_SIZE};

/// Identifies one page request so its response can be checked for staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    seq: u64,
    offset: u32,
    limit: u32,
}

impl PageTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Accumulates the users who liked one post, one offset page at a time.
///
/// Responses are applied only when they are newer than the last applied one
/// and were issued for the current end of the list. `reset` makes every
/// outstanding response stale.
#[derive(Debug, Clone)]
pub struct LikersPager {
    post_id: String,
    page_size: u32,
    exclude_current: bool,
    users: Vec<UserSummary>,
    status: RequestStatus,
    exhausted: bool,
    issued: u64,
    applied: u64,
}

impl LikersPager {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            exclude_current: false,
            users: Vec::new(),
            status: RequestStatus::Idle,
            exhausted: false,
            issued: 0,
            applied: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn excluding_current_user(mut self, exclude: bool) -> Self {
        self.exclude_current = exclude;
        self
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// A short page came back; there is nothing after it.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Issue the next page request.
    pub fn begin(&mut self) -> PageTicket {
        self.issued += 1;
        self.status = RequestStatus::Pending;
        PageTicket {
            seq: self.issued,
            offset: self.users.len() as u32,
            limit: self.page_size,
        }
    }

    pub fn query(&self, ticket: &PageTicket) -> UsersQuery {
        UsersQuery {
            post_liked_id: Some(self.post_id.clone()),
            offset: ticket.offset,
            limit: ticket.limit,
            exclude_current: self.exclude_current,
        }
    }

    /// Apply a response. Returns `false` when it was stale and dropped.
    pub fn apply(
        &mut self,
        ticket: PageTicket,
        result: Result<Vec<UserSummary>, ErrorType>,
    ) -> bool {
        let latest = ticket.seq == self.issued;

        if ticket.seq <= self.applied || ticket.offset as usize != self.users.len() {
            tracing::debug!(
                post_id = %self.post_id,
                seq = ticket.seq,
                offset = ticket.offset,
                "Discarding stale likers page"
            );
            if latest && self.status.is_pending() {
                self.status = RequestStatus::Succeeded;
            }
            return false;
        }

        self.applied = ticket.seq;
        match result {
            Ok(page) => {
                self.exhausted = (page.len() as u32) < ticket.limit;
                self.users.extend(page);
                if latest {
                    self.status = RequestStatus::Succeeded;
                }
            }
            Err(error_type) => {
                if latest {
                    self.status = RequestStatus::Failed(error_type);
                }
            }
        }
        true
    }

    pub fn reset(&mut self) {
        self.users.clear();
        self.applied = self.issued;
        self.status = RequestStatus::Idle;
        self.exhausted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: usize) -> UserSummary {
        UserSummary {
            id: format!("u{}", n),
            username: format!("user{}", n),
            avatar_url: None,
        }
    }

    fn page(range: std::ops::Range<usize>) -> Vec<UserSummary> {
        range.map(user).collect()
    }

    #[test]
    fn pages_accumulate_in_order() {
        let mut pager = LikersPager::new("p1").with_page_size(2);
        let first = pager.begin();
        assert_eq!(first.offset(), 0);
        assert!(pager.apply(first, Ok(page(0..2))));

        let second = pager.begin();
        assert_eq!(second.offset(), 2);
        assert!(pager.apply(second, Ok(page(2..3))));

        assert_eq!(pager.users().len(), 3);
        assert!(pager.is_exhausted());
        assert_eq!(pager.status(), RequestStatus::Succeeded);
    }

    #[test]
    fn duplicate_request_for_same_offset_is_dropped() {
        let mut pager = LikersPager::new("p1").with_page_size(2);
        let a = pager.begin();
        let b = pager.begin();
        assert_eq!(a.offset(), b.offset());

        assert!(pager.apply(a, Ok(page(0..2))));
        assert!(!pager.apply(b, Ok(page(0..2))));
        assert_eq!(pager.users().len(), 2);
        assert!(!pager.status().is_pending());
    }

    #[test]
    fn older_response_after_newer_is_dropped() {
        let mut pager = LikersPager::new("p1").with_page_size(2);
        let a = pager.begin();
        let b = pager.begin();

        assert!(pager.apply(b, Ok(page(0..2))));
        assert!(!pager.apply(a, Ok(page(0..2))));
        assert_eq!(pager.users().len(), 2);
    }

    #[test]
    fn reset_makes_outstanding_responses_stale() {
        let mut pager = LikersPager::new("p1");
        let ticket = pager.begin();
        pager.reset();
        assert!(!pager.apply(ticket, Ok(page(0..3))));
        assert!(pager.users().is_empty());
        assert_eq!(pager.status(), RequestStatus::Idle);
    }

    #[test]
    fn failure_is_reported_and_retry_resumes() {
        let mut pager = LikersPager::new("p1").with_page_size(2);
        let ticket = pager.begin();
        assert!(pager.apply(ticket, Err(ErrorType::NotFound)));
        assert_eq!(pager.status(), RequestStatus::Failed(ErrorType::NotFound));

        let retry = pager.begin();
        assert_eq!(retry.offset(), 0);
        assert!(pager.apply(retry, Ok(page(0..2))));
        assert_eq!(pager.users().len(), 2);
    }

    #[test]
    fn query_targets_post() {
        let mut pager = LikersPager::new("p1").excluding_current_user(true);
        let ticket = pager.begin();
        let query = pager.query(&ticket);
        assert_eq!(query.post_liked_id.as_deref(), Some("p1"));
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert!(query.exclude_current);
    }
}
