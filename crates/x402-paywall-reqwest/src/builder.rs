use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::PaywallClient;

/// Routes every request of a reqwest client through a [`PaywallClient`].
pub trait ReqwestWithPaywall<A> {
    fn with_paywall(self, paywall: PaywallClient) -> ReqwestWithPaywallBuilder<A>;
}

impl ReqwestWithPaywall<Client> for Client {
    fn with_paywall(self, paywall: PaywallClient) -> ReqwestWithPaywallBuilder<Client> {
        ReqwestWithPaywallBuilder {
            inner: self,
            paywall,
        }
    }
}

impl ReqwestWithPaywall<ClientBuilder> for ClientBuilder {
    fn with_paywall(self, paywall: PaywallClient) -> ReqwestWithPaywallBuilder<ClientBuilder> {
        ReqwestWithPaywallBuilder {
            inner: self,
            paywall,
        }
    }
}

pub struct ReqwestWithPaywallBuilder<A> {
    inner: A,
    paywall: PaywallClient,
}

pub trait ReqwestWithPaywallBuild {
    type BuildResult;
    type BuilderResult;

    fn build(self) -> Self::BuildResult;
    /// Returns the middleware builder, for stacking further middleware.
    fn builder(self) -> Self::BuilderResult;
}

impl ReqwestWithPaywallBuild for ReqwestWithPaywallBuilder<Client> {
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.paywall)
    }
}

impl ReqwestWithPaywallBuild for ReqwestWithPaywallBuilder<ClientBuilder> {
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.paywall))
    }
}
