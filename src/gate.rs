//! Routing decision engine.
//!
//! # Data Flow
//! ```text
//! GateBuilder (allowlist | denylist, fallback, extractor)
//!     → build(): validate lists, parse MatcherSet
//!     → Gate
//!         → bind(primary) → Entry        (repeatable, shares the Gate)
//!             → call(request, args)
//!                 → extract address → MatcherSet::matches → Route
//!                 → primary(request, args) | fallback(request, args)
//! ```
//!
//! Everything built here is immutable, so a gate and all entries bound from
//! it can be invoked from any number of threads at once.
//!
//! # Fallback policy
//! A gate built without [`GateBuilder::fallback`] uses [`Forbidden`], which
//! answers 403 on the response-like argument. Such a gate can only be
//! called with arguments implementing [`Respond`], or with a tuple of up to
//! five elements whose first element does (`(res, next)`). The compiler
//! enforces that, so there is no runtime "missing fallback" failure.

use crate::config::{Config, Settings};
use crate::error::GateError;
use crate::extract::{DefaultExtractor, Extract, HeaderExtractor};
use crate::matcher::MatcherSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Status written by [`Forbidden`].
pub const FORBIDDEN_STATUS: u16 = 403;

/// Whether the configured list grants or denies passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Listed addresses reach the primary handler.
    Allow,
    /// Listed addresses are diverted to the fallback.
    Deny,
}

impl Mode {
    /// Route for an address that did or did not match the list.
    pub fn route(self, matched: bool) -> Route {
        match (self, matched) {
            (Mode::Allow, true) | (Mode::Deny, false) => Route::Primary,
            (Mode::Allow, false) | (Mode::Deny, true) => Route::Fallback,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Allow => f.write_str("allow"),
            Mode::Deny => f.write_str("deny"),
        }
    }
}

/// Outcome of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Primary,
    Fallback,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Primary => f.write_str("primary"),
            Route::Fallback => f.write_str("fallback"),
        }
    }
}

/// A request handler taking the request plus the caller's extra arguments.
///
/// `args` is whatever the caller passes alongside the request (a response
/// writer, a tuple of several values, `()`), moved through unchanged.
/// Implemented for every `Fn(R, A) -> O`.
pub trait Handler<R, A> {
    type Output;

    fn call(&self, request: R, args: A) -> Self::Output;
}

impl<R, A, O, F> Handler<R, A> for F
where
    F: Fn(R, A) -> O,
{
    type Output = O;

    fn call(&self, request: R, args: A) -> O {
        self(request, args)
    }
}

/// Response-like collaborator the built-in fallback writes to.
pub trait Respond {
    fn set_status(&mut self, status: u16);

    fn end(&mut self);
}

impl<T: Respond + ?Sized> Respond for &mut T {
    fn set_status(&mut self, status: u16) {
        (**self).set_status(status)
    }

    fn end(&mut self) {
        (**self).end()
    }
}

/// Default fallback: sets status 403 and ends the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forbidden;

impl<R, S: Respond> Handler<R, S> for Forbidden {
    type Output = ();

    fn call(&self, _request: R, mut response: S) {
        response.set_status(FORBIDDEN_STATUS);
        response.end();
    }
}

/// `Forbidden` for argument tuples led by the response, e.g. `(res, next)`.
/// The remaining elements are dropped untouched.
macro_rules! forbidden_with_extra_args {
    ($($rest:ident),+) => {
        impl<R, S: Respond, $($rest),+> Handler<R, (S, $($rest,)+)> for Forbidden {
            type Output = ();

            fn call(&self, request: R, (response, ..): (S, $($rest,)+)) {
                Handler::<R, S>::call(self, request, response)
            }
        }
    };
}

forbidden_with_extra_args!(A1);
forbidden_with_extra_args!(A1, A2);
forbidden_with_extra_args!(A1, A2, A3);
forbidden_with_extra_args!(A1, A2, A3, A4);

/// Builder for [`Gate`].
pub struct GateBuilder<F = Forbidden, X = DefaultExtractor> {
    allowlist: Option<Vec<String>>,
    denylist: Option<Vec<String>>,
    fallback: F,
    extractor: X,
    settings: Settings,
}

impl GateBuilder {
    pub fn new() -> Self {
        Self {
            allowlist: None,
            denylist: None,
            fallback: Forbidden,
            extractor: DefaultExtractor,
            settings: Settings::default(),
        }
    }
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GateBuilder<Forbidden, HeaderExtractor> {
    /// Start from loaded configuration, resolving file-backed lists.
    pub fn from_config(config: &Config) -> Result<Self, GateError> {
        let (mode, list) = config.selected_list()?;
        let entries = list.resolve()?;

        let builder = GateBuilder::new()
            .settings(config.settings.clone())
            .extractor(HeaderExtractor::from_config(&config.ip_extraction));

        Ok(match mode {
            Mode::Allow => builder.allowlist(entries),
            Mode::Deny => builder.denylist(entries),
        })
    }
}

impl<F, X> GateBuilder<F, X> {
    /// Addresses allowed through.
    pub fn allowlist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = Some(entries.into_iter().map(Into::into).collect());
        self
    }

    /// Addresses diverted to the fallback.
    pub fn denylist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist = Some(entries.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the default [`Forbidden`] fallback.
    pub fn fallback<G>(self, fallback: G) -> GateBuilder<G, X> {
        GateBuilder {
            allowlist: self.allowlist,
            denylist: self.denylist,
            fallback,
            extractor: self.extractor,
            settings: self.settings,
        }
    }

    /// Replace the default address extractor.
    pub fn extractor<Y>(self, extractor: Y) -> GateBuilder<F, Y> {
        GateBuilder {
            allowlist: self.allowlist,
            denylist: self.denylist,
            fallback: self.fallback,
            extractor,
            settings: self.settings,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate the lists and build the gate.
    pub fn build(self) -> Result<Gate<F, X>, GateError> {
        let (mode, entries) = match (self.allowlist, self.denylist) {
            (Some(list), None) => (Mode::Allow, list),
            (None, Some(list)) => (Mode::Deny, list),
            (Some(_), Some(_)) => return Err(GateError::ConflictingLists),
            (None, None) => return Err(GateError::MissingList),
        };

        let matchers = MatcherSet::new(&entries)?;

        info!(
            mode = %mode,
            entries = matchers.len(),
            "IP gate initialized"
        );

        Ok(Gate {
            inner: Arc::new(GateInner {
                matchers,
                mode,
                fallback: self.fallback,
                extractor: self.extractor,
                settings: self.settings,
            }),
        })
    }
}

struct GateInner<F, X> {
    matchers: MatcherSet,
    mode: Mode,
    fallback: F,
    extractor: X,
    settings: Settings,
}

/// Decision engine: a matcher set, a mode, a fallback and an extractor.
///
/// Cheap to clone; clones share the same immutable state.
pub struct Gate<F = Forbidden, X = DefaultExtractor> {
    inner: Arc<GateInner<F, X>>,
}

impl<F, X> Clone for Gate<F, X> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, X> fmt::Debug for Gate<F, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("mode", &self.inner.mode)
            .field("matchers", &self.inner.matchers)
            .finish_non_exhaustive()
    }
}

impl Gate {
    pub fn builder() -> GateBuilder {
        GateBuilder::new()
    }
}

impl Gate<Forbidden, HeaderExtractor> {
    /// Build a gate from loaded configuration with the default fallback.
    pub fn from_config(config: &Config) -> Result<Self, GateError> {
        GateBuilder::from_config(config)?.build()
    }
}

impl<F, X> Gate<F, X> {
    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn matchers(&self) -> &MatcherSet {
        &self.inner.matchers
    }

    /// Bind a primary handler, producing an independent entry point.
    pub fn bind<P>(&self, primary: P) -> Entry<P, F, X> {
        Entry {
            gate: self.clone(),
            primary: Arc::new(primary),
        }
    }

    /// Decide the route for a request.
    pub fn decide<R>(&self, request: &R) -> Route
    where
        X: Extract<R>,
    {
        let address = self.inner.extractor.extract(request);
        self.decide_address(address.as_deref())
    }

    /// Decide the route for an already extracted address.
    pub fn decide_address(&self, address: Option<&str>) -> Route {
        let matched = self.inner.matchers.matches(address);
        let route = self.inner.mode.route(matched);

        let settings = &self.inner.settings;
        let log = match route {
            Route::Primary => settings.log_allowed,
            Route::Fallback => settings.log_denied,
        };
        if log {
            debug!(
                address = address.unwrap_or("-"),
                mode = %self.inner.mode,
                matched,
                route = %route,
                "Routing request"
            );
        }

        route
    }
}

/// A gate bound to one primary handler.
pub struct Entry<P, F = Forbidden, X = DefaultExtractor> {
    gate: Gate<F, X>,
    primary: Arc<P>,
}

impl<P, F, X> Clone for Entry<P, F, X> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            primary: Arc::clone(&self.primary),
        }
    }
}

impl<P, F, X> fmt::Debug for Entry<P, F, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl<P, F, X> Entry<P, F, X> {
    pub fn gate(&self) -> &Gate<F, X> {
        &self.gate
    }

    /// Route one request to the primary handler or the fallback.
    pub fn call<R, A>(&self, request: R, args: A) -> P::Output
    where
        X: Extract<R>,
        P: Handler<R, A>,
        F: Handler<R, A, Output = P::Output>,
    {
        match self.gate.decide(&request) {
            Route::Primary => Handler::call(&*self.primary, request, args),
            Route::Fallback => Handler::call(&self.gate.inner.fallback, request, args),
        }
    }
}

impl<R, A, P, F, X> Handler<R, A> for Entry<P, F, X>
where
    X: Extract<R>,
    P: Handler<R, A>,
    F: Handler<R, A, Output = P::Output>,
{
    type Output = P::Output;

    fn call(&self, request: R, args: A) -> Self::Output {
        Entry::call(self, request, args)
    }
}
