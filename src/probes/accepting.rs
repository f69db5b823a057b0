//! # Acceptance predicates and their composition with a probe.
//!
//! [`Expectation`] is a described predicate over the probe result. The
//! engine folds it into the probe through [`AcceptingProbe`], so the retry loop
//! only ever sees "the attempt produced an acceptable value, or not":
//!
//! ```text
//! probe.attempt(ctx) ──► Ok(v)  ── expectation(&v) ──► true  → Ok(Some(v))
//!                    │                            └──► false → Ok(None)
//!                    └─► Err(e) ───────────────────────────────► Err(ProbeFailure)
//! ```

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ProbeFailure;
use crate::probes::probe::ProbeRef;

type PredicateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Described acceptance predicate.
///
/// # Example
/// ```
/// use pollvisor::Expectation;
///
/// let even = Expectation::new("is even", |v: &u32| v % 2 == 0);
/// let small = Expectation::new("is small", |v: &u32| *v < 10);
/// let both = Expectation::all_of(vec![even, small]);
///
/// assert!(both.accepts(&4));
/// assert!(!both.accepts(&12));
/// assert_eq!(both.description(), "(is even and is small)");
/// ```
pub struct Expectation<T> {
    description: Arc<str>,
    f: PredicateFn<T>,
}

impl<T> Clone for Expectation<T> {
    fn clone(&self) -> Self {
        Self {
            description: Arc::clone(&self.description),
            f: Arc::clone(&self.f),
        }
    }
}

impl<T> fmt::Debug for Expectation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expectation").field(&self.description).finish()
    }
}

impl<T: 'static> Expectation<T> {
    /// Wraps a predicate with a description.
    pub fn new<F>(description: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            f: Arc::new(f),
        }
    }

    /// Accepts every value.
    pub fn any() -> Self {
        Self::new("any value", |_| true)
    }

    /// Accepts values equal to `other`.
    pub fn equals_to(other: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync,
    {
        let description = format!("is equal to {other:?}");
        Self::new(description, move |v| *v == other)
    }

    /// Negation of `inner`.
    pub fn not(inner: Expectation<T>) -> Self {
        let description = format!("not {}", inner.description);
        Self::new(description, move |v| !inner.accepts(v))
    }

    /// Accepts when at least one of `all` accepts. Empty lists accept nothing.
    pub fn any_of(all: Vec<Expectation<T>>) -> Self {
        let description = Self::join(&all, " or ");
        Self::new(description, move |v| all.iter().any(|e| e.accepts(v)))
    }

    /// Accepts when every one of `all` accepts. Empty lists accept everything.
    pub fn all_of(all: Vec<Expectation<T>>) -> Self {
        let description = Self::join(&all, " and ");
        Self::new(description, move |v| all.iter().all(|e| e.accepts(v)))
    }

    fn join(all: &[Expectation<T>], sep: &str) -> String {
        let parts: Vec<&str> = all.iter().map(|e| e.description()).collect();
        format!("({})", parts.join(sep))
    }
}

impl<T> Expectation<T> {
    /// Evaluates the predicate.
    #[inline]
    pub fn accepts(&self, value: &T) -> bool {
        (self.f)(value)
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A probe with its acceptance predicate folded in.
pub struct AcceptingProbe<T> {
    probe: ProbeRef<T>,
    expectation: Expectation<T>,
}

impl<T> Clone for AcceptingProbe<T> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            expectation: self.expectation.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for AcceptingProbe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceptingProbe")
            .field("probe", &self.probe.name())
            .field("expecting", &format_args!("{}", self.expectation.description()))
            .finish()
    }
}

impl<T: Send + 'static> AcceptingProbe<T> {
    /// Composes `probe` with `expectation`.
    pub fn new(probe: ProbeRef<T>, expectation: Expectation<T>) -> Self {
        Self { probe, expectation }
    }

    /// Name of the underlying probe.
    pub fn name(&self) -> &str {
        self.probe.name()
    }

    /// The acceptance predicate.
    pub fn expectation(&self) -> &Expectation<T> {
        &self.expectation
    }

    /// Runs one attempt: `Some(v)` if accepted, `None` if rejected.
    pub async fn attempt(&self, ctx: CancellationToken) -> Result<Option<T>, ProbeFailure> {
        let value = self
            .probe
            .attempt(ctx)
            .await
            .map_err(ProbeFailure::from_boxed)?;
        Ok(self.expectation.accepts(&value).then_some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::probes::ProbeFn;

    #[test]
    fn combinators_describe_themselves() {
        let five = Expectation::equals_to(5u8);
        assert_eq!(five.description(), "is equal to 5");
        let not_five = Expectation::not(five);
        assert!(not_five.accepts(&4));
        assert!(!not_five.accepts(&5));
        assert_eq!(not_five.description(), "not is equal to 5");
    }

    #[test]
    fn any_of_and_all_of_on_empty_lists() {
        assert!(!Expectation::<u8>::any_of(Vec::new()).accepts(&1));
        assert!(Expectation::<u8>::all_of(Vec::new()).accepts(&1));
    }

    #[tokio::test]
    async fn rejected_value_becomes_none() {
        let probe: ProbeRef<&'static str> =
            ProbeFn::arc("y", |_ctx: CancellationToken| async { Ok::<_, BoxError>("Y") });
        let accepting = AcceptingProbe::new(probe, Expectation::new("never", |_| false));
        let out = accepting.attempt(CancellationToken::new()).await.unwrap();
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn failure_is_wrapped() {
        let probe: ProbeRef<u8> = ProbeFn::arc("boom", |_ctx: CancellationToken| async {
            Err::<u8, BoxError>("boom".into())
        });
        let accepting = AcceptingProbe::new(probe, Expectation::any());
        let err = accepting.attempt(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
