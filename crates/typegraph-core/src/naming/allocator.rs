//! Global identifier allocation across naming namespaces.

use indexmap::IndexMap;

use crate::error::CompileError;
use crate::ir::Namespace;

/// Who holds an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub namespace: Namespace,
    /// Location of the schema that claimed it.
    pub origin: String,
}

/// Explicit allocation context: every identifier handed out by one
/// compilation, in claim order.
///
/// The first claimant of a base identifier keeps it. A later claimant from
/// a different namespace first tries its namespace-qualified form (e.g.
/// `BarParameter`); any collision left after that gets numeric suffixes
/// `2, 3, ...`, bounded by `max_attempts`.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    taken: IndexMap<String, Claim>,
    max_attempts: usize,
}

impl NameAllocator {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            taken: IndexMap::new(),
            max_attempts,
        }
    }

    pub fn is_taken(&self, ident: &str) -> bool {
        self.taken.contains_key(ident)
    }

    pub fn claim_of(&self, ident: &str) -> Option<&Claim> {
        self.taken.get(ident)
    }

    /// Every identifier handed out so far, in claim order.
    pub fn claimed(&self) -> impl Iterator<Item = &str> {
        self.taken.keys().map(String::as_str)
    }

    /// Claim `base`, or a unique variant of it.
    ///
    /// `qualified` is `base` with the claimant's namespace qualifier applied,
    /// tried when `base` is held by another namespace.
    pub fn claim(
        &mut self,
        base: &str,
        qualified: Option<&str>,
        namespace: Namespace,
        origin: &str,
    ) -> Result<String, CompileError> {
        let claim = Claim {
            namespace,
            origin: origin.to_string(),
        };

        let Some(holder) = self.taken.get(base) else {
            self.taken.insert(base.to_string(), claim);
            return Ok(base.to_string());
        };

        let mut stem = base;
        if holder.namespace != namespace {
            if let Some(qualified) = qualified {
                if !self.taken.contains_key(qualified) {
                    tracing::debug!(
                        base,
                        qualified,
                        holder = %holder.origin,
                        "cross-namespace collision resolved by qualifier"
                    );
                    self.taken.insert(qualified.to_string(), claim);
                    return Ok(qualified.to_string());
                }
                stem = qualified;
            }
        }

        for n in 2..self.max_attempts.saturating_add(2) {
            let candidate = format!("{stem}{n}");
            if !self.taken.contains_key(&candidate) {
                self.taken.insert(candidate.clone(), claim);
                return Ok(candidate);
            }
        }

        Err(CompileError::NameCollisionExhausted {
            path: origin.to_string(),
            base: base.to_string(),
            attempts: self.max_attempts,
        })
    }
}
