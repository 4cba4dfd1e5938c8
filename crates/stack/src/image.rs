//! Container image reference helpers

use std::fmt;

/// `[registry/]repository[:tag][@digest]`, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest.to_string())),
            None => (reference, None),
        };

        // A colon after the last slash is a tag; before it, a registry port
        let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (repository, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&rest[..split], Some(rest[split + 1..].to_string()))
            }
            None => (rest, None),
        };

        Self {
            repository: repository.to_string(),
            tag,
            digest,
        }
    }

    /// Last repository path component, without tag or digest.
    pub fn short_name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository)
    }

    pub fn without_tag(&self) -> &str {
        &self.repository
    }

    /// Does a builder's declared image produce this reference?
    ///
    /// Exact match, or the declaration leaves out the tag/digest the
    /// reference pins.
    pub fn is_produced_by(&self, declared: &str) -> bool {
        let declared_ref = ImageRef::parse(declared);
        if declared_ref == *self {
            return true;
        }
        declared_ref.tag.is_none()
            && declared_ref.digest.is_none()
            && declared_ref.repository == self.repository
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
