//! Verifiable function mocks.

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use core::{fmt, ops};
use std::sync::Arc;

use crate::registry::FunctionKey;

/// Expected number of calls for an [`Expectation`].
///
/// Can be created from a `usize` (exact number of calls) or any range of `usize`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Times {
    min: usize,
    max: Option<usize>, // inclusive
}

impl Default for Times {
    fn default() -> Self {
        Self::ANY
    }
}

impl Times {
    /// Any number of calls, including none.
    pub const ANY: Self = Self { min: 0, max: None };

    /// Checks whether `count` calls satisfy this expectation.
    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    fn is_saturated_by(&self, count: usize) -> bool {
        self.max.map_or(false, |max| count >= max)
    }
}

impl fmt::Display for Times {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (1, Some(1)) => formatter.write_str("once"),
            (min, Some(max)) if min == max => write!(formatter, "{min} times"),
            (0, None) => formatter.write_str("any number of times"),
            (min, None) => write!(formatter, "at least {}", CallCount(min)),
            (0, Some(max)) => write!(formatter, "at most {}", CallCount(max)),
            (min, Some(max)) => write!(formatter, "between {min} and {max} times"),
        }
    }
}

/// Number of calls with the correct plural form.
#[derive(Debug, Clone, Copy)]
struct CallCount(usize);

impl fmt::Display for CallCount {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => formatter.write_str("1 time"),
            count => write!(formatter, "{count} times"),
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)] // called with field refs by `thiserror`
fn format_calls(count: &usize) -> CallCount {
    CallCount(*count)
}

impl From<usize> for Times {
    fn from(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }
}

impl From<ops::Range<usize>> for Times {
    fn from(range: ops::Range<usize>) -> Self {
        assert!(range.start < range.end, "empty range of calls: {range:?}");
        Self {
            min: range.start,
            max: Some(range.end - 1),
        }
    }
}

impl From<ops::RangeInclusive<usize>> for Times {
    fn from(range: ops::RangeInclusive<usize>) -> Self {
        let (min, max) = range.into_inner();
        assert!(min <= max, "empty range of calls: {min}..={max}");
        Self {
            min,
            max: Some(max),
        }
    }
}

impl From<ops::RangeFrom<usize>> for Times {
    fn from(range: ops::RangeFrom<usize>) -> Self {
        Self {
            min: range.start,
            max: None,
        }
    }
}

impl From<ops::RangeTo<usize>> for Times {
    fn from(range: ops::RangeTo<usize>) -> Self {
        Self::from(0..range.end)
    }
}

impl From<ops::RangeToInclusive<usize>> for Times {
    fn from(range: ops::RangeToInclusive<usize>) -> Self {
        Self {
            min: 0,
            max: Some(range.end),
        }
    }
}

impl From<ops::RangeFull> for Times {
    fn from(_: ops::RangeFull) -> Self {
        Self::ANY
    }
}

type Matcher<A> = Arc<dyn Fn(&A) -> bool + Send + Sync>;
type Responder<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;

/// Single expectation of a [`FunctionMock`].
///
/// Created via [`FunctionMock::expect()`]. By default, an expectation matches any args,
/// accepts any number of calls and has no response; calls to it will panic unless
/// a response is configured.
pub struct Expectation<A, R> {
    matcher: Option<Matcher<A>>,
    responder: Option<Responder<A, R>>,
    times: Times,
    call_count: usize,
}

impl<A, R> fmt::Debug for Expectation<A, R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Expectation")
            .field("times", &self.times)
            .field("call_count", &self.call_count)
            .finish_non_exhaustive()
    }
}

impl<A, R> Expectation<A, R> {
    fn new() -> Self {
        Self {
            matcher: None,
            responder: None,
            times: Times::ANY,
            call_count: 0,
        }
    }

    fn matches(&self, args: &A) -> bool {
        self.matcher.as_ref().map_or(true, |matcher| matcher(args))
    }

    /// Sets the expected number of calls.
    pub fn times(&mut self, times: impl Into<Times>) -> &mut Self {
        self.times = times.into();
        self
    }

    /// Expects exactly one call.
    pub fn once(&mut self) -> &mut Self {
        self.times(1)
    }

    /// Expects no calls.
    pub fn never(&mut self) -> &mut Self {
        self.times(0)
    }

    /// Matches calls with args satisfying the predicate.
    pub fn withf<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.matcher = Some(Arc::new(predicate));
        self
    }

    /// Responds to matched calls with the value returned by `function`.
    pub fn returning<F>(&mut self, function: F) -> &mut Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(function));
        self
    }

    /// Returns the number of calls matched by this expectation so far.
    pub fn call_count(&self) -> usize {
        self.call_count
    }
}

impl<A, R> Expectation<A, R>
where
    A: PartialEq + Send + Sync + 'static,
{
    /// Matches calls with args equal to `args`.
    pub fn with(&mut self, args: A) -> &mut Self {
        self.withf(move |actual| *actual == args)
    }
}

impl<A, R> Expectation<A, R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Responds to matched calls with a clone of `value`.
    pub fn return_const(&mut self, value: R) -> &mut Self {
        self.returning(move |_| value.clone())
    }
}

impl<A, R: Default> Expectation<A, R> {
    /// Responds to matched calls with the default value of the return type.
    pub fn return_default(&mut self) -> &mut Self {
        self.returning(|_| R::default())
    }
}

/// Failed verification of a [`FunctionMock`] expectation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "`{key}`: expectation #{index} was expected to be called {expected}, \
     actually called {}",
    format_calls(.actual)
)]
pub struct VerificationError {
    key: FunctionKey,
    index: usize,
    expected: Times,
    actual: usize,
}

impl VerificationError {
    /// Returns the mocked function.
    pub fn key(&self) -> &FunctionKey {
        &self.key
    }

    /// Returns the zero-based index of the failed expectation.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the expected number of calls.
    pub fn expected(&self) -> Times {
        self.expected
    }

    /// Returns the actual number of calls.
    pub fn actual(&self) -> usize {
        self.actual
    }
}

struct MockState<A, R> {
    expectations: Vec<Expectation<A, R>>,
    call_count: usize,
}

/// Verifiable mock of a function with args `A` (a tuple) and return type `R`.
///
/// A `FunctionMock` is a cheaply clonable handle; all clones share the same expectations.
/// Calls are matched against the expectations in the order the expectations were added:
/// the first matching expectation that has not yet reached its maximum number of calls
/// handles the call. If all matching expectations are saturated, the last of them
/// handles the call, so that the excessive call is reported by [`Self::verify()`].
///
/// # Examples
///
/// ```
/// # use interpose::{FunctionKey, FunctionMock};
/// let mock = FunctionMock::<(i32, i32), Vec<i32>>::new(FunctionKey::new("app", "range"));
/// mock.expect().with((4, 5)).once().return_const(vec![2, 3]);
/// mock.expect().returning(|(start, end)| (start..=end).collect());
///
/// assert_eq!(mock.call((4, 5)), [2, 3]);
/// assert_eq!(mock.call((4, 5)), [4, 5]);
/// assert_eq!(mock.call((1, 3)), [1, 2, 3]);
/// assert_eq!(mock.calls(), 3);
/// mock.verify()?;
/// # Ok::<_, interpose::VerificationError>(())
/// ```
pub struct FunctionMock<A, R> {
    key: Arc<FunctionKey>,
    state: Arc<Mutex<MockState<A, R>>>,
}

impl<A, R> Clone for FunctionMock<A, R> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, R> fmt::Debug for FunctionMock<A, R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        formatter
            .debug_struct("FunctionMock")
            .field("key", &self.key)
            .field("expectations", &state.expectations)
            .field("call_count", &state.call_count)
            .finish()
    }
}

impl<A, R> FunctionMock<A, R> {
    /// Creates a mock without expectations.
    pub fn new(key: FunctionKey) -> Self {
        Self {
            key: Arc::new(key),
            state: Arc::new(Mutex::new(MockState {
                expectations: Vec::new(),
                call_count: 0,
            })),
        }
    }

    /// Returns the mocked function.
    pub fn key(&self) -> &FunctionKey {
        &self.key
    }

    /// Adds a new expectation and returns an exclusive handle to configure it.
    ///
    /// The handle locks the mock; drop it (e.g., by configuring the expectation in a single
    /// statement) before calling the mocked function.
    pub fn expect(&self) -> MappedMutexGuard<'_, Expectation<A, R>> {
        MutexGuard::map(self.state.lock(), |state| {
            state.expectations.push(Expectation::new());
            state.expectations.last_mut().unwrap()
        })
    }

    /// Returns the total number of calls to this mock.
    pub fn calls(&self) -> usize {
        self.state.lock().call_count
    }

    /// Checks that the call counts of all expectations are satisfied.
    ///
    /// # Errors
    ///
    /// Returns an error for the first unsatisfied expectation.
    pub fn verify(&self) -> Result<(), VerificationError> {
        let state = self.state.lock();
        let failed = state
            .expectations
            .iter()
            .enumerate()
            .find(|(_, expectation)| !expectation.times.contains(expectation.call_count));
        match failed {
            Some((index, expectation)) => Err(VerificationError {
                key: (*self.key).clone(),
                index,
                expected: expectation.times,
                actual: expectation.call_count,
            }),
            None => Ok(()),
        }
    }
}

impl<A: fmt::Debug, R> FunctionMock<A, R> {
    /// Calls the mock.
    ///
    /// # Panics
    ///
    /// - Panics if no expectation matches `args`.
    /// - Panics if the matching expectation has no configured response.
    pub fn call(&self, args: A) -> R {
        let responder = {
            let mut state = self.state.lock();
            state.call_count += 1;
            let expectations = &mut state.expectations;
            let index = expectations
                .iter()
                .position(|exp| exp.matches(&args) && !exp.times.is_saturated_by(exp.call_count))
                .or_else(|| expectations.iter().rposition(|exp| exp.matches(&args)));
            let Some(index) = index else {
                panic!("`{}`: no expectation matches call with args {args:?}", self.key);
            };

            let expectation = &mut expectations[index];
            expectation.call_count += 1;
            expectation.responder.clone().unwrap_or_else(|| {
                panic!(
                    "`{}`: expectation #{index} matching args {args:?} has no configured response",
                    self.key
                );
            })
        };
        // The lock is released here, so the response may call the mock recursively.
        responder(args)
    }
}

/// Type-erased verification of mocks.
pub(crate) trait VerifyMock: Send {
    fn verify(&self) -> Result<(), VerificationError>;
}

impl<A, R> VerifyMock for FunctionMock<A, R> {
    fn verify(&self) -> Result<(), VerificationError> {
        FunctionMock::verify(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use static_assertions::assert_impl_all;

    assert_impl_all!(FunctionMock<(String,), Vec<u8>>: Send, Sync, Clone);

    fn mock<A, R>() -> FunctionMock<A, R> {
        FunctionMock::new(FunctionKey::new("Bar", "mail"))
    }

    #[test]
    fn times_display() {
        assert_eq!(Times::from(1).to_string(), "once");
        assert_eq!(Times::from(0).to_string(), "0 times");
        assert_eq!(Times::from(1..).to_string(), "at least 1 time");
        assert_eq!(Times::from(..2).to_string(), "at most 1 time");
        assert_eq!(Times::from(..).to_string(), "any number of times");
        assert_eq!(Times::from(2..).to_string(), "at least 2 times");
        assert_eq!(Times::from(..=3).to_string(), "at most 3 times");
        assert_eq!(Times::from(..4).to_string(), "at most 3 times");
        assert_eq!(Times::from(1..=3).to_string(), "between 1 and 3 times");
    }

    #[test]
    fn times_contains() {
        let times = Times::from(1..3);
        assert!(!times.contains(0));
        assert!(times.contains(1));
        assert!(times.contains(2));
        assert!(!times.contains(3));
        assert!(Times::ANY.contains(0));
        assert!(Times::ANY.contains(usize::MAX));
    }

    #[test]
    fn unmet_expectation() {
        let mock = mock::<(String,), bool>();
        mock.expect().once().return_const(true);

        let err = mock.verify().unwrap_err();
        assert_eq!(err.index(), 0);
        assert_eq!(err.expected(), Times::from(1));
        assert_eq!(err.actual(), 0);
        assert_eq!(
            err.to_string(),
            "`Bar::mail`: expectation #0 was expected to be called once, \
             actually called 0 times"
        );
    }

    #[test]
    fn excessive_calls_are_reported() {
        let mock = mock::<(u32,), u32>();
        mock.expect().with((1,)).once().returning(|(x,)| x + 1);
        assert_eq!(mock.call((1,)), 2);
        assert_eq!(mock.call((1,)), 2);

        let err = mock.verify().unwrap_err();
        assert_eq!(err.actual(), 2);
    }

    #[test]
    fn single_call_is_reported_in_singular() {
        let mock = mock::<(u32,), u32>();
        mock.expect().times(2).return_const(0);
        mock.call((1,));

        let err = mock.verify().unwrap_err();
        assert!(
            err.to_string().ends_with("was expected to be called 2 times, actually called 1 time"),
            "{err}"
        );
    }

    #[test]
    fn saturated_expectations_are_skipped() {
        let mock = mock::<(), &'static str>();
        mock.expect().once().return_const("first");
        mock.expect().times(2).return_const("second");
        mock.expect().return_const("rest");

        let responses: Vec<_> = (0..5).map(|_| mock.call(())).collect();
        assert_eq!(responses, ["first", "second", "second", "rest", "rest"]);
        mock.verify().unwrap();
        assert_eq!(mock.calls(), 5);
    }

    #[test]
    fn predicate_matching() {
        let mock = mock::<(String, usize), String>();
        mock.expect()
            .withf(|(s, _)| s.starts_with('a'))
            .returning(|(s, n)| s.repeat(n));
        mock.expect().return_default();

        assert_eq!(mock.call(("ab".to_owned(), 2)), "abab");
        assert_eq!(mock.call(("ba".to_owned(), 2)), "");
        mock.verify().unwrap();
    }

    #[test]
    fn clones_share_state() {
        let mock = mock::<(), u8>();
        let clone = mock.clone();
        mock.expect().times(2).return_const(7);
        assert_eq!(clone.call(()), 7);
        assert_eq!(clone.call(()), 7);
        mock.verify().unwrap();
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn recursive_responses() {
        let mock = mock::<(u64,), u64>();
        let inner = mock.clone();
        mock.expect().returning(move |(n,)| {
            if n <= 1 {
                1
            } else {
                n * inner.call((n - 1,))
            }
        });
        assert_eq!(mock.call((5,)), 120);
        assert_eq!(mock.calls(), 5);
    }

    #[test]
    #[should_panic(expected = "no expectation matches call with args (3,)")]
    fn unexpected_call() {
        let mock = mock::<(u32,), u32>();
        mock.expect().with((1,)).return_const(0);
        mock.call((3,));
    }

    #[test]
    #[should_panic(expected = "has no configured response")]
    fn call_without_response() {
        let mock = mock::<(), u32>();
        mock.expect().once();
        mock.call(());
    }
}
