use serde_json::Value;
use tracing::{debug, warn};

use super::{IntegrationError, Transport};

pub const GITHUB_API_BASE: &str = "https://api.github.com";

const PER_PAGE: &str = "100";

/// An issue or pull request as shown in the GitHub view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueItem {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub repository_full_name: Option<String>,
    pub repository_url: Option<String>,
    pub user_login: Option<String>,
    pub is_pull_request: bool,
}

impl IssueItem {
    pub fn from_api(data: &Value) -> Result<Self, IntegrationError> {
        let repository_url = data
            .get("repository_url")
            .and_then(Value::as_str)
            .map(str::to_string);

        let repository_full_name = data
            .get("repository")
            .and_then(|r| r.get("full_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| repository_url.as_deref().and_then(repo_name_from_url));

        Ok(IssueItem {
            id: required_i64(data, "id")?,
            number: required_i64(data, "number")?,
            title: required_str(data, "title")?,
            html_url: required_str(data, "html_url")?,
            state: required_str(data, "state")?,
            repository_full_name,
            repository_url,
            user_login: data
                .get("user")
                .and_then(|u| u.get("login"))
                .and_then(Value::as_str)
                .map(str::to_string),
            is_pull_request: data
                .get("pull_request")
                .is_some_and(|pr| !pr.is_null()),
        })
    }

    /// `owner/repo#123`
    pub fn reference(&self) -> String {
        match self.repository_full_name {
            Some(ref repo) => format!("{}#{}", repo, self.number),
            None => format!("#{}", self.number),
        }
    }
}

/// Last two path segments of `.../repos/<owner>/<repo>`
fn repo_name_from_url(url: &str) -> Option<String> {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let repo = segments.next().filter(|s| !s.is_empty())?;
    let owner = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, repo))
}

fn required_i64(data: &Value, key: &str) -> Result<i64, IntegrationError> {
    data.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| IntegrationError::Malformed(format!("missing integer field '{}'", key)))
}

fn required_str(data: &Value, key: &str) -> Result<String, IntegrationError> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| IntegrationError::Malformed(format!("missing string field '{}'", key)))
}

/// Everything the GitHub view shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitHubData {
    pub assigned_issues: Vec<IssueItem>,
    pub review_requested: Vec<IssueItem>,
    pub my_prs: Vec<IssueItem>,
}

pub struct GitHubClient<T: Transport> {
    transport: T,
    allowed_repos: Vec<String>,
}

impl<T: Transport> GitHubClient<T> {
    /// An empty allow-list admits every repository
    pub fn new(transport: T, allowed_repos: Vec<String>) -> Self {
        Self {
            transport,
            allowed_repos,
        }
    }

    fn allowed(&self, item: &IssueItem) -> bool {
        self.allowed_repos.is_empty()
            || item
                .repository_full_name
                .as_ref()
                .is_some_and(|name| self.allowed_repos.contains(name))
    }

    fn decode_items<'a, I>(&self, values: I) -> Result<Vec<IssueItem>, IntegrationError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut items = Vec::new();
        for value in values {
            let item = IssueItem::from_api(value)?;
            if self.allowed(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Open issues assigned to the user. Pull requests are dropped.
    pub fn assigned_issues(&self) -> Result<Vec<IssueItem>, IntegrationError> {
        let body = self.transport.get_json(
            "/issues",
            &[
                ("filter", "assigned".to_string()),
                ("state", "open".to_string()),
                ("per_page", PER_PAGE.to_string()),
            ],
        )?;
        let array = body
            .as_array()
            .ok_or_else(|| IntegrationError::Malformed("expected an array of issues".to_string()))?;
        let items = self.decode_items(array)?;
        Ok(items.into_iter().filter(|i| !i.is_pull_request).collect())
    }

    fn search(&self, q: &str) -> Result<Vec<IssueItem>, IntegrationError> {
        let body = self.transport.get_json(
            "/search/issues",
            &[("q", q.to_string()), ("per_page", PER_PAGE.to_string())],
        )?;
        match body.get("items").and_then(Value::as_array) {
            Some(items) => self.decode_items(items),
            None => Ok(Vec::new()),
        }
    }

    pub fn review_requested_prs(&self) -> Result<Vec<IssueItem>, IntegrationError> {
        self.search("review-requested:@me is:open is:pr")
    }

    pub fn my_prs(&self) -> Result<Vec<IssueItem>, IntegrationError> {
        self.search("author:@me is:open is:pr")
    }

    /// True when `/user` answers; any failure means the token is unusable
    pub fn validate_token(&self) -> bool {
        match self.transport.get_json("/user", &[]) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "github token validation failed");
                false
            }
        }
    }
}

impl<T: Transport + Sync> GitHubClient<T> {
    /// Run the three fetches concurrently. The first error wins.
    pub fn fetch_all(&self) -> Result<GitHubData, IntegrationError> {
        let (assigned, review, mine) = std::thread::scope(|s| {
            let assigned = s.spawn(|| self.assigned_issues());
            let review = s.spawn(|| self.review_requested_prs());
            let mine = s.spawn(|| self.my_prs());
            (join(assigned), join(review), join(mine))
        });

        let data = GitHubData {
            assigned_issues: assigned?,
            review_requested: review?,
            my_prs: mine?,
        };
        debug!(
            issues = data.assigned_issues.len(),
            reviews = data.review_requested.len(),
            prs = data.my_prs.len(),
            "fetched github data"
        );
        Ok(data)
    }
}

fn join<R>(
    handle: std::thread::ScopedJoinHandle<'_, Result<R, IntegrationError>>,
) -> Result<R, IntegrationError> {
    handle.join().unwrap_or_else(|_| {
        warn!("github fetch thread panicked");
        Err(IntegrationError::Transport("fetch thread panicked".to_string()))
    })
}
