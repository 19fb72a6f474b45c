//! Typed reqwest client for the ledger service's accounts, transactions,
//! rule-groups, and rules resources.

use std::time::Duration;

use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use reroute_core::model::{Account, AccountKind, Rule, RuleGroup, RuleSpec, Transaction, UserInfo};
use reroute_core::reconcile::Ledger;
use reroute_core::LedgerError;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::wire::{
    AccountAttributes, ErrorBody, Page, Resource, RuleAttributes, RuleGroupAttributes, Single,
    TransactionGroupAttributes, UserAttributes,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the ledger service's REST API, authenticated with a personal
/// access token.
pub struct LedgerClient {
    client: reqwest::Client,
    base_url: String,
}

impl LedgerClient {
    /// Create a client for the given base URL and access token.
    ///
    /// `base_url` should be like `https://ledger.example.org` (no trailing
    /// slash). Requests carry an explicit timeout; expiry surfaces as a
    /// transport failure.
    pub fn new(base_url: &str, token: &str) -> Result<Self, LedgerError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| LedgerError::Config("access token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pagination links may be absolute or service-relative.
    fn absolutize(&self, link: String) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link
        } else {
            self.url(&link)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, LedgerError> {
        debug!(url, "GET");
        let resp = self.client.get(url).send().await.map_err(transport)?;
        let resp = check(resp).await?;
        resp.json().await.map_err(transport)
    }

    /// Fetch every page of a collection endpoint, following `links.next`.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<Vec<Resource<T>>, LedgerError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.data);
            next = page.links.next.map(|link| self.absolutize(link));
        }
        Ok(items)
    }

    /// Validate credentials and identify the token's user.
    pub async fn current_user(&self) -> Result<UserInfo, LedgerError> {
        let user: Single<UserAttributes> = self.get_json(&self.url("/api/v1/about/user")).await?;
        Ok(UserInfo {
            email: user.data.attributes.email,
        })
    }

    /// List every account known to the service.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let items = self
            .get_all_pages::<AccountAttributes>(self.url("/api/v1/accounts"))
            .await?;
        info!(count = items.len(), "listed accounts");
        Ok(items.into_iter().map(Account::from).collect())
    }

    /// Exact-name account lookup via the service's search endpoint.
    ///
    /// Absence is a plain `None`; call sites that require existence raise
    /// their own error.
    pub async fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, LedgerError> {
        let mut url = reqwest::Url::parse(&self.url("/api/v1/search/accounts"))
            .map_err(|e| LedgerError::Config(format!("invalid base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("field", "name")
            .append_pair("query", name);
        let matches = self.get_all_pages::<AccountAttributes>(url.into()).await?;
        Ok(matches
            .into_iter()
            .map(Account::from)
            .find(|account| account.name == name))
    }

    /// Create an account; a duplicate name surfaces as `Conflict`.
    pub async fn create_account(
        &self,
        name: &str,
        kind: AccountKind,
    ) -> Result<Account, LedgerError> {
        debug!(name, kind = kind.as_str(), "creating account");
        let body = serde_json::json!({"name": name, "type": kind});
        let resp = self
            .client
            .post(self.url("/api/v1/accounts"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let text = resp.text().await.unwrap_or_default();
            if is_name_conflict(&text) {
                return Err(LedgerError::Conflict {
                    what: "account",
                    name: name.to_string(),
                });
            }
            return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY.as_u16(), &text));
        }
        let resp = check(resp).await?;
        let created: Single<AccountAttributes> = resp.json().await.map_err(transport)?;
        info!(name, id = %created.data.id, "created account");
        Ok(created.data.into())
    }

    /// Lazily stream the withdrawals of one account, page by page.
    ///
    /// Each call returns a fresh stream; the next page is fetched only once
    /// the previous one is exhausted, and split groups are flattened into
    /// individual transactions.
    pub fn transactions(
        &self,
        account_id: &str,
    ) -> impl Stream<Item = Result<Transaction, LedgerError>> + '_ {
        let first = format!(
            "{}?type=withdrawal",
            self.url(&format!("/api/v1/accounts/{account_id}/transactions"))
        );
        stream::try_unfold(Some(first), move |state: Option<String>| async move {
            let Some(url) = state else {
                return Ok(None);
            };
            let page: Page<TransactionGroupAttributes> = self.get_json(&url).await?;
            let next = page.links.next.map(|link| self.absolutize(link));
            let batch: Vec<Result<Transaction, LedgerError>> = page
                .data
                .into_iter()
                .flat_map(|group| group.attributes.transactions)
                .map(|split| Ok(Transaction::from(split)))
                .collect();
            Ok(Some((stream::iter(batch), next)))
        })
        .try_flatten()
    }

    /// Look up a rule group by its exact title.
    ///
    /// Rule groups are operator-provisioned prerequisites; absence is a
    /// fatal configuration error, never an auto-create.
    pub async fn find_rule_group_by_name(&self, title: &str) -> Result<RuleGroup, LedgerError> {
        let groups = self
            .get_all_pages::<RuleGroupAttributes>(self.url("/api/v1/rule-groups"))
            .await?;
        groups
            .into_iter()
            .map(RuleGroup::from)
            .find(|group| group.title == title)
            .ok_or_else(|| {
                LedgerError::Config(format!(
                    "rule group {title:?} not found; create it in the ledger service first"
                ))
            })
    }

    /// List the rules of one group.
    pub async fn list_rules(&self, group_id: &str) -> Result<Vec<Rule>, LedgerError> {
        let items = self
            .get_all_pages::<RuleAttributes>(
                self.url(&format!("/api/v1/rule-groups/{group_id}/rules")),
            )
            .await?;
        info!(count = items.len(), group_id, "listed rules");
        Ok(items.into_iter().map(Rule::from).collect())
    }

    /// Create a rule from the given spec.
    pub async fn create_rule(&self, spec: &RuleSpec) -> Result<Rule, LedgerError> {
        info!(title = %spec.title, group = %spec.rule_group_title, "creating rule");
        let resp = self
            .client
            .post(self.url("/api/v1/rules"))
            .json(spec)
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        let created: Single<RuleAttributes> = resp.json().await.map_err(transport)?;
        Ok(Rule::from(created.data))
    }

    /// Ask the service to apply a rule to the transactions it already stores.
    pub async fn trigger_rule(&self, rule_id: &str) -> Result<(), LedgerError> {
        debug!(rule_id, "triggering rule");
        let resp = self
            .client
            .post(self.url(&format!("/api/v1/rules/{rule_id}/trigger")))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }
}

impl Ledger for LedgerClient {
    async fn find_account(&mut self, name: &str) -> Result<Option<Account>, LedgerError> {
        LedgerClient::find_account_by_name(self, name).await
    }

    async fn create_account(
        &mut self,
        name: &str,
        kind: AccountKind,
    ) -> Result<Account, LedgerError> {
        LedgerClient::create_account(self, name, kind).await
    }

    async fn create_rule(&mut self, spec: &RuleSpec) -> Result<Rule, LedgerError> {
        LedgerClient::create_rule(self, spec).await
    }

    async fn trigger_rule(&mut self, rule_id: &str) -> Result<(), LedgerError> {
        LedgerClient::trigger_rule(self, rule_id).await
    }
}

fn transport(err: reqwest::Error) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

/// Classify an error response: auth rejections are fatal, everything else
/// surfaces the service-reported body.
async fn check(resp: Response) -> Result<Response, LedgerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(LedgerError::Auth {
            status: status.as_u16(),
        });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

/// Decode the service's `{"message", "exception"}` error body, falling back
/// to a snippet of the raw text.
fn api_error(status: u16, body: &str) -> LedgerError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => match err.exception {
            Some(exception) => LedgerError::Api(format!("{exception}: {}", err.message)),
            None => LedgerError::Api(err.message),
        },
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            LedgerError::Api(format!("HTTP {status}: {snippet}"))
        }
    }
}

/// The service reports duplicate names as a validation failure, not a
/// dedicated status code.
fn is_name_conflict(body: &str) -> bool {
    body.contains("already in use") || body.contains("already exists")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = LedgerClient::new("https://ledger.example.org/", "token").unwrap();
        assert_eq!(client.base_url, "https://ledger.example.org");
        assert_eq!(
            client.url("/api/v1/about/user"),
            "https://ledger.example.org/api/v1/about/user"
        );
    }

    #[test]
    fn relative_next_links_are_absolutized() {
        let client = LedgerClient::new("https://ledger.example.org", "token").unwrap();
        assert_eq!(
            client.absolutize("/api/v1/accounts?page=2".into()),
            "https://ledger.example.org/api/v1/accounts?page=2"
        );
        assert_eq!(
            client.absolutize("https://other.example.org/accounts?page=2".into()),
            "https://other.example.org/accounts?page=2"
        );
    }

    #[test]
    fn api_error_prefers_the_structured_body() {
        let err = api_error(
            500,
            r#"{"message": "Query exception", "exception": "QueryException"}"#,
        );
        assert_eq!(
            err.to_string(),
            "ledger service error: QueryException: Query exception"
        );

        let err = api_error(422, r#"{"message": "Invalid rule trigger."}"#);
        assert_eq!(err.to_string(), "ledger service error: Invalid rule trigger.");
    }

    #[test]
    fn api_error_falls_back_to_a_snippet() {
        let err = api_error(502, "<html>Bad Gateway</html>");
        assert_eq!(
            err.to_string(),
            "ledger service error: HTTP 502: <html>Bad Gateway</html>"
        );
    }

    #[test]
    fn duplicate_name_bodies_are_conflicts() {
        assert!(is_name_conflict(
            r#"{"message": "This account name is already in use."}"#
        ));
        assert!(!is_name_conflict(r#"{"message": "Name may not be empty."}"#));
    }
}
