//! deciding whether a failed attempt is worth another try
//! the default is to retry; an error can opt out (or back in) either by being marked
//! with [`mark_permanent`] / [`mark_temporary`], or by exposing [`Temporary`] through [`Classified`]

use crate::error::BoxError;
use std::error::Error;
use std::fmt;

/// Capability of an error to say whether retrying it can help.
pub trait Temporary {
    fn is_temporary(&self) -> bool;
}

/// an error that also answers [`Temporary`]
pub trait TemporaryError: Temporary + Error + Send + Sync + 'static {
    fn as_error(&self) -> &(dyn Error + 'static);
}

impl<E> TemporaryError for E
where
    E: Temporary + Error + Send + Sync + 'static,
{
    fn as_error(&self) -> &(dyn Error + 'static) {
        self
    }
}

/// An error explicitly marked as permanent or temporary.
///
/// The mark only steers the retry loop. When the loop gives the error back it strips
/// a top-level mark and returns the original error.
#[derive(Debug)]
pub struct Marked {
    inner: BoxError,
    temporary: bool,
}

/// stop retrying on this error
pub fn mark_permanent<E: Into<BoxError>>(err: E) -> Marked {
    Marked {
        inner: err.into(),
        temporary: false,
    }
}

/// keep retrying on this error, whatever else it says about itself
pub fn mark_temporary<E: Into<BoxError>>(err: E) -> Marked {
    Marked {
        inner: err.into(),
        temporary: true,
    }
}

impl Marked {
    #[must_use]
    pub fn get_ref(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl Temporary for Marked {
    fn is_temporary(&self) -> bool {
        self.temporary
    }
}

impl fmt::Display for Marked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Error for Marked {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.inner)
    }
}

/// Makes an error's own [`Temporary`] answer visible to the retry loop.
///
/// `&dyn Error` cannot be asked for arbitrary traits, so the loop only recognises
/// capabilities it can find by type while walking `source()`; wrap the error to be found.
#[derive(Debug)]
pub struct Classified {
    inner: Box<dyn TemporaryError>,
}

impl Classified {
    pub fn new<E: TemporaryError>(err: E) -> Self {
        Self {
            inner: Box::new(err),
        }
    }

    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.as_error().downcast_ref::<E>()
    }
}

impl Temporary for Classified {
    fn is_temporary(&self) -> bool {
        self.inner.is_temporary()
    }
}

impl fmt::Display for Classified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Error for Classified {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner.as_error())
    }
}

/// How the retry loop treats one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// marked permanent somewhere in the chain
    Permanent,
    /// marked temporary somewhere in the chain
    Temporary,
    /// no mark, but something in the chain says it is not temporary
    NotTemporary,
    /// no signal at all
    Unclassified,
}

impl Disposition {
    pub(crate) fn should_retry(self) -> bool {
        matches!(self, Disposition::Temporary | Disposition::Unclassified)
    }
}

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&link| link.source())
}

/// Explicit marks win over capabilities, and the outermost of each wins.
pub(crate) fn classify(err: &(dyn Error + 'static)) -> Disposition {
    if let Some(marked) = chain(err).find_map(|link| link.downcast_ref::<Marked>()) {
        return if marked.temporary {
            Disposition::Temporary
        } else {
            Disposition::Permanent
        };
    }
    match chain(err).find_map(|link| link.downcast_ref::<Classified>()) {
        Some(classified) if !classified.is_temporary() => Disposition::NotTemporary,
        _ => Disposition::Unclassified,
    }
}

/// Whether the first error in the chain that can answer [`Temporary`] says no.
#[must_use]
pub fn is_permanent(err: &(dyn Error + 'static)) -> bool {
    chain(err)
        .find_map(|link| {
            link.downcast_ref::<Marked>()
                .map(Temporary::is_temporary)
                .or_else(|| link.downcast_ref::<Classified>().map(Temporary::is_temporary))
        })
        .is_some_and(|temporary| !temporary)
}

/// Strip a top-level mark, leaving anything else untouched.
pub(crate) fn unmark(err: BoxError) -> BoxError {
    match err.downcast::<Marked>() {
        Ok(marked) => marked.inner,
        Err(err) => err,
    }
}
