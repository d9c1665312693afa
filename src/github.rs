//! GitHub implementation of [`ChangeRequestProvider`] over the REST v3 API.
//!
//! Open pull requests are listed once when the provider is created and the
//! list is kept current as requests are opened and closed, so duplicate
//! checks during a run never hit the network.

use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::change_request::{
    is_component_branch, ChangeRequest, ChangeRequestProvider, PullRequest,
};
use crate::error::{Error, Result};

const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
    head: HeadResponse,
}

#[derive(Debug, Deserialize)]
struct HeadResponse {
    #[serde(rename = "ref")]
    branch: String,
}

impl From<PullRequestResponse> for PullRequest {
    fn from(response: PullRequestResponse) -> Self {
        Self {
            number: response.number,
            url: response.html_url,
            head_branch: response.head.branch,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

/// Pull requests of one GitHub repository.
pub struct GitHubProvider {
    client: Client,
    repo_url: Url,
    default_branch: String,
    open_requests: Mutex<Vec<PullRequest>>,
}

impl GitHubProvider {
    /// Connects to `repo_name` (`owner/repo`) and caches its open pull requests.
    pub fn new(api_url: &str, repo_name: &str, token: &str) -> Result<Self> {
        let (owner, repo) = repo_name
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| Error::Config {
                message: format!("Repository name '{repo_name}' is not in 'owner/repo' form"),
            })?;

        let base = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))?;
        let repo_url = base.join(&format!("repos/{owner}/{repo}/"))?;

        let client = Self::build_client(token)?;
        let repository: RepositoryResponse =
            check(client.get(repo_url.as_str()).send()?)?.json()?;
        debug!(
            "Default branch of {} is '{}'",
            repo_name, repository.default_branch
        );

        let provider = Self {
            client,
            repo_url,
            default_branch: repository.default_branch,
            open_requests: Mutex::new(Vec::new()),
        };
        let open = provider.fetch_open_requests()?;
        info!("Found {} open pull requests in {}", open.len(), repo_name);
        *provider.lock_open_requests() = open;

        Ok(provider)
    }

    fn build_client(token: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            Error::Config {
                message: "GitHub token contains invalid characters".to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        Ok(Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("component-updater/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.repo_url.join(path)?)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        check(request.send()?)
    }

    fn lock_open_requests(&self) -> std::sync::MutexGuard<'_, Vec<PullRequest>> {
        self.open_requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fetch_open_requests(&self) -> Result<Vec<PullRequest>> {
        let mut requests = Vec::new();
        let mut page = 1;

        loop {
            let url = self.endpoint("pulls")?;
            let batch: Vec<PullRequestResponse> = self
                .send(self.client.get(url.as_str()).query(&[
                    ("state", "open".to_string()),
                    ("per_page", PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ]))?
                .json()?;

            let done = batch.len() < PAGE_SIZE;
            requests.extend(batch.into_iter().map(PullRequest::from));
            if done {
                return Ok(requests);
            }
            page += 1;
        }
    }

    fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&format!("issues/{number}/labels"))?;
        self.send(
            self.client
                .post(url.as_str())
                .json(&serde_json::json!({ "labels": labels })),
        )?;
        Ok(())
    }
}

fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().unwrap_or_default();
    Err(Error::GitHub {
        message: format!("{status} from {url}: {}", body.trim()),
    })
}

impl ChangeRequestProvider for GitHubProvider {
    fn open_request(&self, request: &ChangeRequest) -> Result<PullRequest> {
        let url = self.endpoint("pulls")?;
        let created: PullRequestResponse = self
            .send(self.client.post(url.as_str()).json(&CreatePullRequest {
                title: &request.title,
                body: &request.body,
                head: &request.branch,
                base: &self.default_branch,
            }))?
            .json()?;
        let pull_request = PullRequest::from(created);

        self.add_labels(pull_request.number, &request.labels)?;
        self.lock_open_requests().push(pull_request.clone());

        Ok(pull_request)
    }

    fn request_exists_for_branch(&self, branch: &str) -> Result<bool> {
        Ok(self
            .lock_open_requests()
            .iter()
            .any(|pr| pr.head_branch == branch))
    }

    fn open_requests_for_component(&self, normalized_name: &str) -> Result<Vec<PullRequest>> {
        Ok(self
            .lock_open_requests()
            .iter()
            .filter(|pr| is_component_branch(&pr.head_branch, normalized_name))
            .cloned()
            .collect())
    }

    fn close_request(&self, number: u64, comment: &str) -> Result<()> {
        let comments = self.endpoint(&format!("issues/{number}/comments"))?;
        self.send(
            self.client
                .post(comments.as_str())
                .json(&serde_json::json!({ "body": comment })),
        )?;

        let pull = self.endpoint(&format!("pulls/{number}"))?;
        self.send(
            self.client
                .patch(pull.as_str())
                .json(&serde_json::json!({ "state": "closed" })),
        )?;

        self.lock_open_requests().retain(|pr| pr.number != number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_repository_name() {
        for name in ["", "owner", "owner/", "/repo", "a/b/c"] {
            assert!(
                matches!(
                    GitHubProvider::new("http://127.0.0.1:1", name, "token"),
                    Err(Error::Config { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn test_pull_request_response() {
        let json = r#"{
            "number": 42,
            "html_url": "https://github.com/acme/infra/pull/42",
            "head": {"ref": "component-update/vpc/2.0.0", "sha": "abc"},
            "state": "open"
        }"#;
        let pr: PullRequest = serde_json::from_str::<PullRequestResponse>(json)
            .unwrap()
            .into();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.head_branch, "component-update/vpc/2.0.0");
    }
}
