//! In-memory stores and a request driver for handler tests.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    catalog::{Catalog, FileRecord, Folder, NewFile},
    config::{AppConfig, SessionConfig, ShareConfig, UploadConfig},
    error::{AppError, AppResult},
    sessions::{SessionRecord, SessionStore, SESSION_COOKIE},
    state::{signing_secret, AppState},
    storage::Storage,
};

const BOUNDARY: &str = "foldershare-test-boundary";
pub const PASSWORD: &str = "pw123";

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    folders: Vec<Folder>,
    files: Vec<FileRecord>,
    sessions: Vec<SessionRecord>,
    fail_session_destroy: bool,
    fail_file_inserts: bool,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// One store standing in for users, catalog and sessions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.lock().folders.iter().map(|f| f.name.clone()).collect()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.lock().files.iter().map(|f| f.name.clone()).collect()
    }

    pub fn fail_session_destroy(&self, fail: bool) {
        self.lock().fail_session_destroy = fail;
    }

    pub fn fail_file_inserts(&self, fail: bool) {
        self.lock().fail_file_inserts = fail;
    }

    pub fn remove_user_by_email(&self, email: &str) {
        self.lock().users.retain(|u| u.email != email);
    }

    fn last_folder_named(&self, name: &str) -> Option<i64> {
        self.lock()
            .folders
            .iter()
            .rev()
            .find(|f| f.name == name)
            .map(|f| f.id)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == new.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let user = User {
            id: inner.next_id(),
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn list_folders(&self) -> AppResult<Vec<Folder>> {
        Ok(self.lock().folders.clone())
    }

    async fn list_folders_by_owner(&self, user_id: i64) -> AppResult<Vec<Folder>> {
        Ok(self
            .lock()
            .folders
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_folder(&self, name: &str, user_id: i64) -> AppResult<Folder> {
        let mut inner = self.lock();
        let folder = Folder {
            id: inner.next_id(),
            name: name.to_string(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.folders.push(folder.clone());
        Ok(folder)
    }

    async fn find_folder(&self, id: i64) -> AppResult<Option<Folder>> {
        Ok(self.lock().folders.iter().find(|f| f.id == id).cloned())
    }

    async fn delete_folder(&self, id: i64) -> AppResult<Vec<FileRecord>> {
        let mut inner = self.lock();
        let before = inner.folders.len();
        inner.folders.retain(|f| f.id != id);
        if inner.folders.len() == before {
            return Err(AppError::not_found("Folder"));
        }
        let (removed, kept) = std::mem::take(&mut inner.files)
            .into_iter()
            .partition(|f| f.folder_id == Some(id));
        inner.files = kept;
        Ok(removed)
    }

    async fn list_files(&self) -> AppResult<Vec<FileRecord>> {
        Ok(self.lock().files.clone())
    }

    async fn list_files_in_folder(&self, folder_id: i64) -> AppResult<Vec<FileRecord>> {
        Ok(self
            .lock()
            .files
            .iter()
            .filter(|f| f.folder_id == Some(folder_id))
            .cloned()
            .collect())
    }

    async fn find_file(&self, id: i64) -> AppResult<Option<FileRecord>> {
        Ok(self.lock().files.iter().find(|f| f.id == id).cloned())
    }

    async fn create_file(&self, new: &NewFile) -> AppResult<FileRecord> {
        let mut inner = self.lock();
        if inner.fail_file_inserts {
            return Err(AppError::Internal(anyhow::anyhow!("file insert disabled")));
        }
        if let Some(folder_id) = new.folder_id {
            if !inner.folders.iter().any(|f| f.id == folder_id) {
                return Err(AppError::not_found("Folder"));
            }
        }
        let file = FileRecord {
            id: inner.next_id(),
            name: new.name.clone(),
            size: new.size,
            folder_id: new.folder_id,
            url: new.url.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.files.push(file.clone());
        Ok(file)
    }

    async fn delete_file(&self, id: i64) -> AppResult<()> {
        self.lock().files.retain(|f| f.id != id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, record: &SessionRecord) -> AppResult<()> {
        let mut inner = self.lock();
        inner.sessions.retain(|s| s.id != record.id);
        inner.sessions.push(record.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> AppResult<Option<SessionRecord>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.id == id && !s.is_expired_at(now))
            .cloned())
    }

    async fn destroy(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.lock();
        if inner.fail_session_destroy {
            return Err(AppError::Internal(anyhow::anyhow!("session store unavailable")));
        }
        inner.sessions.retain(|s| s.id != id);
        Ok(())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| !s.is_expired_at(now));
        Ok((before - inner.sessions.len()) as u64)
    }
}

pub fn test_config(upload_dir: PathBuf) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        db_max_connections: 1,
        host: "127.0.0.1".into(),
        port: 3000,
        session: SessionConfig {
            secret: Some("test-secret".into()),
            ttl_minutes: 60,
            sweep_secs: 120,
            cookie_secure: false,
        },
        upload: UploadConfig {
            dir: upload_dir,
            max_bytes: 1024 * 1024,
        },
        share: ShareConfig {
            issuer: "foldershare".into(),
            audience: "foldershare-share".into(),
            base_url: "http://localhost:3000".into(),
        },
    }
}

/// The full router over a [`MemoryStore`] and a temporary upload dir.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    storage: Arc<Storage>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(tmp.path().join("uploads")));
        let storage = Arc::new(Storage::new(config.upload.dir.clone()).await.unwrap());
        let store = Arc::new(MemoryStore::default());
        let secret = signing_secret(&config.session);

        let state = AppState::from_parts(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            storage.clone(),
            secret,
        );

        Self {
            router: build_app(state),
            store,
            storage,
            _tmp: tmp,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let req = with_cookie(Request::builder().method(Method::GET).uri(path), cookie)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response {
        let req = with_cookie(Request::builder().method(Method::POST).uri(path), cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn post_raw(
        &self,
        path: &str,
        content_type: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Response {
        let req = with_cookie(Request::builder().method(Method::POST).uri(path), cookie)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Response {
        let body = serde_json::json!({ "email": email, "password": password, "name": name });
        let req = Request::builder()
            .method(Method::POST)
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        let body = format!("email={}&password={}", form_encode(email), form_encode(password));
        self.post_form("/login", &body, None).await
    }

    pub async fn login_cookie(&self, email: &str, password: &str) -> String {
        let res = self.login(email, password).await;
        session_cookie(&res).expect("login should set a session cookie")
    }

    /// Register `email` with the shared test password and log in.
    pub async fn signed_in(&self, email: &str) -> String {
        self.register(email, PASSWORD, "Tester").await;
        self.login_cookie(email, PASSWORD).await
    }

    pub async fn create_folder(&self, name: &str, cookie: &str) -> i64 {
        let body = format!("name={}", form_encode(name));
        self.post_form("/folders", &body, Some(cookie)).await;
        self.store
            .last_folder_named(name)
            .expect("folder should have been created")
    }

    pub async fn upload(
        &self,
        name: &str,
        bytes: &[u8],
        folder_id: Option<i64>,
        cookie: &str,
    ) -> Response {
        let folder = folder_id.map(|id| id.to_string());
        let body = multipart_body(Some((name, bytes)), folder.as_deref());
        self.post_multipart(&body, cookie).await
    }

    pub async fn post_multipart(&self, body: &[u8], cookie: &str) -> Response {
        let cookie = Some(cookie).filter(|c| !c.is_empty());
        let req = with_cookie(Request::builder().method(Method::POST).uri("/upload"), cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body.to_vec()))
            .unwrap();
        self.send(req).await
    }

    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(self.storage.root()).unwrap().count()
    }

    /// Take the public upload dir away so publishing fails.
    pub fn remove_upload_root(&self) {
        std::fs::remove_dir_all(self.storage.root()).unwrap();
    }

    pub fn staged_count(&self) -> usize {
        std::fs::read_dir(self.storage.staging_dir()).unwrap().count()
    }
}

fn with_cookie(
    builder: axum::http::request::Builder,
    cookie: Option<&str>,
) -> axum::http::request::Builder {
    match cookie {
        Some(c) if !c.is_empty() => builder.header(header::COOKIE, c),
        _ => builder,
    }
}

fn form_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// `file` part first, then `folderId`.
pub fn multipart_body(file: Option<(&str, &[u8])>, folder_id: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(id) = folder_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"folderId\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_bytes(res: Response) -> Vec<u8> {
    to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(res: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

/// `sid=<signed value>` from the response's `Set-Cookie`, ready to send back.
pub fn session_cookie(res: &Response) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&prefix) && pair.len() > prefix.len())
        .map(str::to_string)
}
