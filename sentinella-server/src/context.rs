use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, AuthResult};

/// Contesto di una richiesta: cancellazione e deadline opzionale,
/// passato a ogni chiamata verso il provider.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// Nessuna deadline, mai cancellato dall'esterno.
    pub fn background() -> Self {
        Self { cancel: CancellationToken::new(), deadline: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { cancel: CancellationToken::new(), deadline: Some(Instant::now() + timeout) }
    }

    /// Lega il contesto a un token di cancellazione esistente.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Esegue `fut` finché il contesto resta valido. Se il token viene cancellato
    /// o la deadline scade, il future viene droppato (la query in volo si interrompe)
    /// e si restituisce `AuthError::Cancelled`.
    pub async fn run<F, T>(&self, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled("request cancelled".into()));
        }
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| AuthError::Cancelled("deadline exceeded".into()))?,
                None => fut.await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled("request cancelled".into())),
            res = bounded => res,
        }
    }
}
