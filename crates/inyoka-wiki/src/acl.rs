//! Access control for wiki pages.
//!
//! Rules come from behavior pages, one per line:
//!
//! ```text
//! Wiki/*      @Registered  +read,edit,create
//! Benutzer/*  @Owner       +manage -delete
//! *           spammer      -edit,create
//! ```
//!
//! A rule applies when its pattern matches the page name and its subject
//! names the user or one of the user's groups. Matching rules are applied in
//! order, `+` adding and `-` removing privileges. Without any matching rule
//! every privilege is granted.

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use inyoka_markup::PagePattern;

/// A single privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    Read,
    Edit,
    Create,
    Attach,
    Delete,
    Manage,
    AttachDangerous,
}

impl Privilege {
    pub const ALL: [Privilege; 7] = [
        Self::Read,
        Self::Edit,
        Self::Create,
        Self::Attach,
        Self::Delete,
        Self::Manage,
        Self::AttachDangerous,
    ];

    fn bit(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Edit => 2,
            Self::Create => 4,
            Self::Attach => 8,
            Self::Delete => 16,
            Self::Manage => 32,
            Self::AttachDangerous => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Create => "create",
            Self::Attach => "attach",
            Self::Delete => "delete",
            Self::Manage => "manage",
            Self::AttachDangerous => "attach_dangerous",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privilege names that are not known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown privilege `{0}`")]
pub struct UnknownPrivilege(pub String);

impl FromStr for Privilege {
    type Err = UnknownPrivilege;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|privilege| privilege.as_str() == s)
            .ok_or_else(|| UnknownPrivilege(s.to_owned()))
    }
}

/// A set of privileges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Privileges(u8);

impl Privileges {
    pub const NONE: Privileges = Privileges(0);
    pub const ALL: Privileges = Privileges(127);

    pub fn contains(self, privilege: Privilege) -> bool {
        self.0 & privilege.bit() != 0
    }

    #[must_use]
    pub fn with(self, privilege: Privilege) -> Self {
        Self(self.0 | privilege.bit())
    }

    #[must_use]
    pub fn without(self, other: Privileges) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Privilege> {
        Privilege::ALL.into_iter().filter(move |privilege| self.contains(*privilege))
    }
}

impl BitOr for Privileges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Privileges {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<Privilege> for Privileges {
    fn from_iter<I: IntoIterator<Item = Privilege>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Group every principal belongs to.
pub const GROUP_ALL: &str = "All";
/// Group of logged in users.
pub const GROUP_REGISTERED: &str = "Registered";
/// Group of anonymous users.
pub const GROUP_UNREGISTERED: &str = "Unregistered";
/// Group of the owners of the page being checked.
pub const GROUP_OWNER: &str = "Owner";

/// Someone asking for access: a user with groups, or an anonymous visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: Option<String>,
    pub groups: BTreeSet<String>,
    /// Remote address, recorded for anonymous edits.
    pub address: String,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self {
            name: None,
            groups: BTreeSet::new(),
            address: "127.0.0.1".to_owned(),
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::anonymous()
        }
    }

    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn is_registered(&self) -> bool {
        self.name.is_some()
    }

    /// Membership in a real or pseudo group. `owners` is only consulted for
    /// the owner group.
    fn in_group(&self, group: &str, owners: &dyn Fn() -> BTreeSet<String>) -> bool {
        match group {
            GROUP_ALL => true,
            GROUP_REGISTERED => self.is_registered(),
            GROUP_UNREGISTERED => !self.is_registered(),
            GROUP_OWNER => owners().iter().any(|owner| match owner.strip_prefix('@') {
                Some(group) => self.groups.contains(group),
                None => self.name.as_deref() == Some(owner.as_str()),
            }),
            _ => self.groups.contains(group),
        }
    }
}

/// Who a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    User(String),
    Group(String),
}

/// One line of an ACL page.
#[derive(Debug, Clone)]
pub struct AclRule {
    pub pattern: PagePattern,
    pub subject: Subject,
    pub add: Privileges,
    pub remove: Privileges,
}

/// Why an ACL line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AclParseError {
    #[error("expected `pattern subject privileges`")]
    Incomplete,
    #[error(transparent)]
    UnknownPrivilege(#[from] UnknownPrivilege),
}

impl FromStr for AclRule {
    type Err = AclParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let (Some(pattern), Some(subject)) = (parts.next(), parts.next()) else {
            return Err(AclParseError::Incomplete);
        };
        let mut add = Privileges::NONE;
        let mut remove = Privileges::NONE;
        let mut adding = true;
        let mut any = false;
        for token in parts.flat_map(|part| part.split(',')) {
            let mut name = token;
            if let Some(rest) = name.strip_prefix('+') {
                adding = true;
                name = rest;
            } else if let Some(rest) = name.strip_prefix('-') {
                adding = false;
                name = rest;
            }
            if name.is_empty() {
                continue;
            }
            let privilege: Privilege = name.parse()?;
            any = true;
            if adding {
                add = add.with(privilege);
            } else {
                remove = remove.with(privilege);
            }
        }
        if !any {
            return Err(AclParseError::Incomplete);
        }
        let subject = match subject.strip_prefix('@') {
            Some(group) => Subject::Group(group.to_owned()),
            None => Subject::User(subject.to_owned()),
        };
        Ok(Self {
            pattern: PagePattern::new(pattern, true),
            subject,
            add,
            remove,
        })
    }
}

/// An ordered list of rules.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    rules: Vec<AclRule>,
}

impl Acl {
    pub fn new(rules: Vec<AclRule>) -> Self {
        Self { rules }
    }

    /// Parse rules line by line. Invalid lines are skipped with a warning.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let rules = lines
            .into_iter()
            .filter_map(|line| match line.parse::<AclRule>() {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(line, error = %e, "Skipping invalid ACL rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Privileges of `principal` on `page`. `owners` lists the page's
    /// owners and is only called if an owner rule needs it.
    pub fn privileges(
        &self,
        principal: &Principal,
        page: &str,
        owners: impl Fn() -> BTreeSet<String>,
    ) -> Privileges {
        let owners_cell = OnceCell::new();
        let load_owners = || owners_cell.get_or_init(&owners).clone();
        let mut privileges = None;
        for rule in &self.rules {
            let applies = match &rule.subject {
                Subject::User(name) => principal.name.as_deref() == Some(name.as_str()),
                Subject::Group(group) => principal.in_group(group, &load_owners),
            };
            if applies && rule.pattern.matches(page) {
                let current = privileges.unwrap_or(Privileges::NONE);
                privileges = Some((current | rule.add).without(rule.remove));
            }
        }
        privileges.unwrap_or(Privileges::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn acl(text: &str) -> Acl {
        Acl::parse(text.lines())
    }

    fn set(privileges: &[Privilege]) -> Privileges {
        privileges.iter().copied().collect()
    }

    fn no_owners() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_parse_rule() {
        let rule: AclRule = "Wiki/* @Registered +read,edit -delete".parse().unwrap();
        assert_eq!(rule.subject, Subject::Group("Registered".to_owned()));
        assert_eq!(rule.add, set(&[Privilege::Read, Privilege::Edit]));
        assert_eq!(rule.remove, set(&[Privilege::Delete]));
        assert!(rule.pattern.matches("Wiki/Hilfe"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("Wiki/*".parse::<AclRule>().unwrap_err(), AclParseError::Incomplete);
        assert_eq!(
            "* ada +fly".parse::<AclRule>().unwrap_err().to_string(),
            "unknown privilege `fly`"
        );
        assert_eq!(acl("* ada +fly\n* ada +read").len(), 1);
    }

    #[test]
    fn test_no_matching_rule_grants_everything() {
        let acl = acl("Intern/* @Team +read");
        assert_eq!(acl.privileges(&Principal::anonymous(), "Startseite", no_owners), Privileges::ALL);
        assert_eq!(Acl::default().privileges(&Principal::user("ada"), "X", no_owners), Privileges::ALL);
    }

    #[test]
    fn test_rules_apply_in_order() {
        let acl = acl("* @All +read,edit,create\n* @Unregistered -edit,create\nIntern/* @All -read,edit,create");
        assert_eq!(
            acl.privileges(&Principal::user("ada"), "Startseite", no_owners),
            set(&[Privilege::Read, Privilege::Edit, Privilege::Create])
        );
        assert_eq!(
            acl.privileges(&Principal::anonymous(), "Startseite", no_owners),
            set(&[Privilege::Read])
        );
        assert!(acl.privileges(&Principal::user("ada"), "Intern/Plan", no_owners).is_empty());
    }

    #[test]
    fn test_groups_and_users() {
        let acl = acl("* @All +read\n* @Team +edit\n* bob +delete");
        let member = Principal::user("ada").with_groups(["Team"]);
        assert_eq!(
            acl.privileges(&member, "Seite", no_owners),
            set(&[Privilege::Read, Privilege::Edit])
        );
        assert_eq!(
            acl.privileges(&Principal::user("bob"), "Seite", no_owners),
            set(&[Privilege::Read, Privilege::Delete])
        );
    }

    #[test]
    fn test_owner_group() {
        let acl = acl("Benutzer/* @All +read\nBenutzer/* @Owner +edit,manage");
        let owners = || BTreeSet::from(["ada".to_owned(), "@Moderatoren".to_owned()]);
        let read_edit_manage = set(&[Privilege::Read, Privilege::Edit, Privilege::Manage]);
        assert_eq!(acl.privileges(&Principal::user("ada"), "Benutzer/ada", owners), read_edit_manage);
        let moderator = Principal::user("carl").with_groups(["Moderatoren"]);
        assert_eq!(acl.privileges(&moderator, "Benutzer/ada", owners), read_edit_manage);
        assert_eq!(
            acl.privileges(&Principal::user("bob"), "Benutzer/ada", owners),
            set(&[Privilege::Read])
        );
    }

    #[test]
    fn test_privilege_names() {
        assert_eq!("attach_dangerous".parse::<Privilege>().unwrap(), Privilege::AttachDangerous);
        let names: Vec<&str> = set(&[Privilege::Edit, Privilege::Read]).iter().map(Privilege::as_str).collect();
        assert_eq!(names, vec!["read", "edit"]);
    }
}
