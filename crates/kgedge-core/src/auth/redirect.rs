/// Sends the user to the external login provider.
///
/// In a browser this is a full-page navigation; other front ends decide
/// what "going to the login page" means for them. The API client calls it
/// once per aborted request and then abandons the request.
pub trait LoginRedirect: Send + Sync {
    fn redirect(&self, login_url: &str);
}
