use axum::Json;
use serde::Serialize;

use crate::auth::{dto::PublicUser, CurrentUser};

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub view: &'static str,
    pub user: Option<PublicUser>,
}

pub async fn home(CurrentUser(user): CurrentUser) -> Json<HomePage> {
    Json(HomePage {
        view: "home",
        user: user.map(Into::into),
    })
}
