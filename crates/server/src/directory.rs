//! Issue ↔ thread directory.
//!
//! Links are created once, when an issue is created from chat, and are never
//! evicted for the lifetime of the process.

use dashmap::DashMap;
use threadrelay_protocol::IssueThreadLink;

#[derive(Debug, Default)]
pub struct IssueDirectory {
    links: DashMap<String, IssueThreadLink>,
}

impl IssueDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, issue_id: &str) -> Option<IssueThreadLink> {
        self.links.get(issue_id).map(|entry| entry.value().clone())
    }

    /// Insert or replace the link for `link.issue_id`.
    pub fn put(&self, link: IssueThreadLink) -> Option<IssueThreadLink> {
        self.links.insert(link.issue_id.clone(), link)
    }

    #[cfg(test)]
    pub fn contains(&self, issue_id: &str) -> bool {
        self.links.contains_key(issue_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All links, sorted by issue id.
    pub fn entries(&self) -> Vec<IssueThreadLink> {
        let mut links: Vec<_> = self
            .links
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        links.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));
        links
    }
}
