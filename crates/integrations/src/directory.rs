use async_trait::async_trait;
use auth::directory::{User, UsersDirectory};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::errors::Error;
use shared::types::{Page, PageMetadata, UserId};

/// HTTP client for the platform users directory.
pub struct HttpUsersDirectory {
    client: Client,
    base_url: String,
}

impl HttpUsersDirectory {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, Error> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(Error::retrieve_entity)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            status if status.is_success() => {
                response.json().await.map_err(Error::retrieve_entity)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::retrieve_entity(format!(
                    "directory returned {status}: {body}"
                )))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ByEmailsRequest<'a> {
    emails: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    users: Vec<User>,
}

#[derive(Debug, Serialize)]
struct ByIdsRequest<'a> {
    ids: &'a [UserId],
    offset: u64,
    limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    dir: shared::types::Direction,
}

#[derive(Debug, Deserialize)]
struct UserPageResponse {
    total: u64,
    users: Vec<User>,
}

#[async_trait]
impl UsersDirectory for HttpUsersDirectory {
    async fn users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, Error> {
        let response: UsersResponse = self
            .post("/users/by-emails", &ByEmailsRequest { emails })
            .await?;
        Ok(response.users)
    }

    async fn users_by_ids(&self, ids: &[UserId], pm: &PageMetadata) -> Result<Page<User>, Error> {
        let response: UserPageResponse = self
            .post(
                "/users/by-ids",
                &ByIdsRequest {
                    ids,
                    offset: pm.offset,
                    limit: pm.limit,
                    email: pm.name.clone(),
                    dir: pm.dir,
                },
            )
            .await?;
        Ok(Page::new(response.total, pm, response.users))
    }
}
