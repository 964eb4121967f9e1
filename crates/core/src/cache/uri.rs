//! Cache keys and redirect resolution over `url::Url`.

use url::Url;

use crate::Error;

/// The lookup key for a URI: the URI without its fragment.
pub fn cache_key(uri: &Url) -> Url {
    if uri.fragment().is_none() {
        return uri.clone();
    }
    let mut key = uri.clone();
    key.set_fragment(None);
    key
}

/// Resolve a redirect `location` relative to `base`.
pub fn resolve(base: &Url, location: &str) -> Result<Url, Error> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::InvalidRedirect("empty location".into()));
    }

    base.join(location)
        .map(|target| cache_key(&target))
        .map_err(|e| Error::InvalidRedirect(format!("{location}: {e}")))
}
