use axum::{extract::State, Json};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::{dto::PublicUser, AuthUser},
    catalog::Folder,
    error::AppResult,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user: PublicUser,
    pub folders: Vec<Folder>,
}

/// The signed-in user and the folders they own.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Dashboard>> {
    let folders = state.catalog.list_folders_by_owner(user.id).await?;
    Ok(Json(Dashboard {
        user: user.into(),
        folders,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing::{self, TestApp};

    #[tokio::test]
    async fn dashboard_requires_login() {
        let app = TestApp::new().await;
        let res = app.get("/dashboard", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(testing::body_json(res).await["code"], "unauthorized");
    }

    #[tokio::test]
    async fn dashboard_lists_only_own_folders() {
        let app = TestApp::new().await;
        let alice = app.signed_in("alice@example.com").await;
        let bob = app.signed_in("bob@example.com").await;
        app.create_folder("Alice stuff", &alice).await;
        app.create_folder("Bob stuff", &bob).await;

        let body = testing::body_json(app.get("/dashboard", Some(&alice)).await).await;
        let folders = body["folders"].as_array().unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0]["name"], "Alice stuff");
    }
}
