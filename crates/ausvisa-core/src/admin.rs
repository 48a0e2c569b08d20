//! Admin dashboard view state: user filtering and graph label selection.
//! Everything here is local; data is reloaded wholesale from the backend.

use std::fmt;

use crate::models::{AdminUser, GraphStats, LabelCount, VALID_ROLES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Pending,
    Suspended,
}

impl UserStatus {
    /// Status shown for a user. The backend has no pending state yet, so a
    /// user is either active or suspended.
    pub fn of(user: &AdminUser) -> Self {
        if user.is_active {
            UserStatus::Active
        } else {
            UserStatus::Suspended
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Pending => "pending",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(UserStatus),
}

impl StatusFilter {
    pub fn all() -> [StatusFilter; 4] {
        [
            StatusFilter::All,
            StatusFilter::Only(UserStatus::Active),
            StatusFilter::Only(UserStatus::Pending),
            StatusFilter::Only(UserStatus::Suspended),
        ]
    }

    pub fn next(self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|f| *f == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(StatusFilter::All),
            "active" => Some(StatusFilter::Only(UserStatus::Active)),
            "pending" => Some(StatusFilter::Only(UserStatus::Pending)),
            "suspended" => Some(StatusFilter::Only(UserStatus::Suspended)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    fn matches(&self, user: &AdminUser) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => UserStatus::of(user) == *status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub keyword: String,
    pub status: StatusFilter,
}

impl UserFilter {
    /// Case-insensitive substring match over "username email role", combined
    /// with the status filter
    pub fn matches(&self, user: &AdminUser) -> bool {
        let keyword = self.keyword.to_lowercase();
        let haystack = format!("{} {} {}", user.username, user.email, user.role).to_lowercase();
        haystack.contains(keyword.trim()) && self.status.matches(user)
    }

    pub fn apply<'a>(&self, users: &'a [AdminUser]) -> Vec<&'a AdminUser> {
        users.iter().filter(|u| self.matches(u)).collect()
    }
}

/// The role after `current` in the backend's role list, wrapping around
pub fn next_role(current: &str) -> &'static str {
    let i = VALID_ROLES
        .iter()
        .position(|r| *r == current)
        .map(|i| i + 1)
        .unwrap_or(0);
    VALID_ROLES[i % VALID_ROLES.len()]
}

pub const DEFAULT_LABELS: [&str; 3] = ["Visa", "University", "SettlementPage"];

/// Which node labels the graph chart shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelection {
    selected: Vec<String>,
}

impl Default for LabelSelection {
    fn default() -> Self {
        Self {
            selected: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl LabelSelection {
    pub fn is_selected(&self, label: &str) -> bool {
        self.selected.iter().any(|l| l == label)
    }

    pub fn toggle(&mut self, label: &str) {
        if let Some(i) = self.selected.iter().position(|l| l == label) {
            self.selected.remove(i);
        } else {
            self.selected.push(label.to_string());
        }
    }

    pub fn select_all(&mut self, stats: &GraphStats) {
        self.selected = stats.node_counts.iter().map(|c| c.label.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Node counts for the selected labels, in the order the backend sent them
    pub fn apply<'a>(&self, stats: &'a GraphStats) -> Vec<&'a LabelCount> {
        stats
            .node_counts
            .iter()
            .filter(|c| self.is_selected(&c.label))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, username: &str, email: &str, role: &str, is_active: bool) -> AdminUser {
        AdminUser {
            id,
            email: email.into(),
            username: username.into(),
            full_name: None,
            role: role.into(),
            is_active,
            created_at: String::new(),
            updated_at: None,
            last_login: None,
            session_count: 0,
        }
    }

    fn users() -> Vec<AdminUser> {
        vec![
            user(1, "Minh", "minh@example.com", "admin", true),
            user(2, "lan", "lan@uni.edu.au", "user", false),
            user(3, "quang", "q@example.com", "editor", true),
        ]
    }

    #[test]
    fn test_keyword_matches_username_email_and_role() {
        let users = users();
        let by_name = UserFilter {
            keyword: "MINH".into(),
            ..Default::default()
        };
        assert_eq!(by_name.apply(&users).len(), 1);

        let by_email = UserFilter {
            keyword: "edu.au".into(),
            ..Default::default()
        };
        assert_eq!(by_email.apply(&users)[0].id, 2);

        let by_role = UserFilter {
            keyword: "editor".into(),
            ..Default::default()
        };
        assert_eq!(by_role.apply(&users)[0].id, 3);

        assert_eq!(UserFilter::default().apply(&users).len(), 3);
    }

    #[test]
    fn test_status_filter() {
        let users = users();
        let suspended = UserFilter {
            status: StatusFilter::Only(UserStatus::Suspended),
            ..Default::default()
        };
        let ids: Vec<i64> = suspended.apply(&users).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2]);

        let pending = UserFilter {
            status: StatusFilter::Only(UserStatus::Pending),
            ..Default::default()
        };
        assert!(pending.apply(&users).is_empty());
    }

    #[test]
    fn test_status_filter_cycles() {
        let mut f = StatusFilter::All;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(f.label());
            f = f.next();
        }
        assert_eq!(seen, vec!["all", "active", "pending", "suspended"]);
        assert_eq!(f, StatusFilter::All);
        assert_eq!(StatusFilter::from_str("Suspended"), Some(StatusFilter::Only(UserStatus::Suspended)));
    }

    #[test]
    fn test_next_role_wraps() {
        assert_eq!(next_role("admin"), "editor");
        assert_eq!(next_role("user"), "admin");
        assert_eq!(next_role("unknown"), "admin");
    }

    #[test]
    fn test_label_selection() {
        let stats = GraphStats {
            node_counts: vec![
                LabelCount { label: "Visa".into(), count: 10 },
                LabelCount { label: "Program".into(), count: 4 },
                LabelCount { label: "University".into(), count: 3 },
            ],
            rel_counts: vec![],
        };
        let mut sel = LabelSelection::default();
        let labels: Vec<&str> = sel.apply(&stats).iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Visa", "University"]);

        sel.toggle("Visa");
        sel.toggle("Program");
        let labels: Vec<&str> = sel.apply(&stats).iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Program", "University"]);

        sel.clear();
        assert!(sel.apply(&stats).is_empty());
        sel.select_all(&stats);
        assert_eq!(sel.apply(&stats).len(), 3);
    }
}
