//! Solution mappings produced by joins.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An RDF term bound to a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    NamedNode(Arc<str>),
    BlankNode(Arc<str>),
    Literal {
        value: Arc<str>,
        /// Datatype IRI, `None` for plain strings
        datatype: Option<Arc<str>>,
        language: Option<Arc<str>>,
    },
}

impl Term {
    pub fn iri(value: impl AsRef<str>) -> Self {
        Term::NamedNode(Arc::from(value.as_ref()))
    }

    pub fn blank(label: impl AsRef<str>) -> Self {
        Term::BlankNode(Arc::from(label.as_ref()))
    }

    pub fn literal(value: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            datatype: None,
            language: None,
        }
    }

    pub fn typed_literal(value: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            datatype: Some(Arc::from(datatype.as_ref())),
            language: None,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Term::NamedNode(v) | Term::BlankNode(v) => v,
            Term::Literal { value, .. } => value,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "{:?}", value.as_ref())?;
                if let Some(lang) = language {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{}>", dt)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// An immutable mapping from variable name to term. Cheap to clone.
///
/// Variables are kept sorted, so two bindings with the same entries render the
/// same [`Bindings::canonical_key`] regardless of how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bindings {
    entries: Arc<BTreeMap<Arc<str>, Term>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `variable` bound to `term`.
    pub fn with(&self, variable: impl AsRef<str>, term: Term) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(Arc::from(variable.as_ref()), term);
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.entries.get(variable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Union of two compatible bindings, `None` if a shared variable disagrees.
    pub fn merge(&self, other: &Bindings) -> Option<Bindings> {
        let mut entries = (*self.entries).clone();
        for (variable, term) in other.entries.iter() {
            match entries.get(variable) {
                Some(existing) if existing != term => return None,
                Some(_) => {}
                None => {
                    entries.insert(variable.clone(), term.clone());
                }
            }
        }
        Some(Self {
            entries: Arc::new(entries),
        })
    }

    /// Serialization used as the deduplication key across join phases.
    pub fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl<K: AsRef<str>> FromIterator<(K, Term)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, Term)>>(iter: I) -> Self {
        Self {
            entries: Arc::new(
                iter.into_iter()
                    .map(|(k, v)| (Arc::from(k.as_ref()), v))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (variable, term)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "?{}: {}", variable, term)?;
        }
        write!(f, "}}")
    }
}
