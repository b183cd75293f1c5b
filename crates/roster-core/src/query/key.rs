use std::fmt;

use crate::models::Page;

/// Resource name of paginated list entries.
pub const STUDENTS: &str = "students";

/// Resource name of single-record entries.
pub const STUDENT: &str = "student";

/// Second half of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Discriminator {
    Page(u32),
    Id(String),
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminator::Page(page) => write!(f, "{}", page),
            Discriminator::Id(id) => f.write_str(id),
        }
    }
}

/// Composite `(resource, discriminator)` cache key.
///
/// Keys compare structurally: two keys built from the same resource and an
/// equal discriminator address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: &'static str,
    discriminator: Discriminator,
}

impl QueryKey {
    pub fn new(resource: &'static str, discriminator: Discriminator) -> Self {
        Self {
            resource,
            discriminator,
        }
    }

    /// `("students", page)`
    pub fn students_page(page: Page) -> Self {
        Self::new(STUDENTS, Discriminator::Page(page.get()))
    }

    /// `("student", id)`. Ids are kept as strings, the form they take in a route.
    pub fn student(id: impl Into<String>) -> Self {
        Self::new(STUDENT, Discriminator::Id(id.into()))
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.discriminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_discriminators_share_a_key() {
        let a = QueryKey::students_page(Page::new(2).expect("page"));
        let b = QueryKey::new(STUDENTS, Discriminator::Page(2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_resources_do_not_collide() {
        // A page number and an id with the same text are different slots
        assert_ne!(
            QueryKey::new(STUDENTS, Discriminator::Id("1".into())),
            QueryKey::new(STUDENT, Discriminator::Id("1".into()))
        );
        assert_ne!(
            QueryKey::new(STUDENT, Discriminator::Page(1)),
            QueryKey::student("1")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryKey::students_page(Page::FIRST).to_string(), "students/1");
        assert_eq!(QueryKey::student("42").to_string(), "student/42");
    }
}
