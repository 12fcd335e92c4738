//! REST バックエンドへの HTTP クライアント
//!
//! ## 責務
//!
//! - Cookie ベースのセッション管理（Cookie jar を全リクエストで共有）
//! - CSRF トークンの取得・キャッシュ・ヘッダ付与
//! - JSON リクエスト/レスポンスとエラーボディの解釈
//!
//! ## 設計ノート
//!
//! CSRF トークンはレスポンスヘッダ `x-csrftoken` を優先し、無ければ
//! `csrftoken` Cookie から読み取ります。状態変更リクエストが 403 で
//! 拒否された場合はトークンを取り直して一度だけ再試行します。
//! 認証の意味づけ（ログイン失敗の分類など）は session 層が行い、
//! この層は HTTP の語彙だけを扱います。

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::infrastructure::dto::http::ErrorBody;

/// CSRF トークンを運ぶリクエストヘッダ
const CSRF_HEADER: &str = "X-CSRFToken";

/// CSRF トークンを運ぶレスポンスヘッダ（小文字で照合）
const CSRF_RESPONSE_HEADER: &str = "x-csrftoken";

/// CSRF トークンを運ぶ Cookie 名
const CSRF_COOKIE: &str = "csrftoken";

/// Ajax リクエストであることを示すヘッダ
const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// HTTP レベルのエラー
#[derive(Debug, Error)]
pub enum ApiError {
    /// リクエストの送信自体に失敗した
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// バックエンドがエラーステータスを返した
    #[error("backend returned status {status}")]
    Status { status: u16, body: ErrorBody },

    /// CSRF トークンがヘッダにも Cookie にも見つからない
    #[error("CSRF token unavailable")]
    CsrfUnavailable,

    /// レスポンスボディが期待する JSON ではない
    #[error("invalid response body: {0}")]
    InvalidBody(serde_json::Error),

    /// ベース URL が URL として不正
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// セッション切れ・未認証を示すステータスか
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// REST バックエンドへのクライアント
///
/// Cookie jar を介してセッション Cookie を保持します。`&mut self` を
/// 取るのは CSRF トークンのキャッシュを更新するためです。
pub struct ApiClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: String,
    origin: Url,
    csrf_token: Option<String>,
}

impl ApiClient {
    /// 新しい ApiClient を作成
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let origin = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()?;
        Ok(Self {
            http,
            jar,
            base_url: base_url.trim_end_matches('/').to_string(),
            origin,
            csrf_token: None,
        })
    }

    /// CSRF トークンをキャッシュ済みでなければ取得する
    pub async fn ensure_csrf(&mut self) -> Result<(), ApiError> {
        if self.csrf_token.is_some() {
            return Ok(());
        }
        self.fetch_csrf().await
    }

    /// CSRF トークンを取得し直してキャッシュする
    pub async fn fetch_csrf(&mut self) -> Result<(), ApiError> {
        let url = self.endpoint("/auth/csrf/");
        let response = self.apply_headers(self.http.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let header_token = response
            .headers()
            .get(CSRF_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.csrf_token = header_token.or_else(|| self.cookie_value(CSRF_COOKIE));

        if self.csrf_token.is_none() {
            return Err(ApiError::CsrfUnavailable);
        }
        tracing::debug!("CSRF token refreshed");
        Ok(())
    }

    /// GET リクエストを送り、JSON レスポンスをデシリアライズする
    pub async fn get_json<T: DeserializeOwned>(&mut self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        let response = self.apply_headers(self.http.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Self::parse_body(response).await
    }

    /// JSON ボディ付きの POST リクエストを送る
    ///
    /// 403 で拒否された場合は CSRF トークンを取り直して一度だけ再試行します。
    pub async fn post_json<B, T>(&mut self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.prefetch_csrf(path).await;
        let url = self.endpoint(path);
        let mut refreshed = false;
        loop {
            let response = self
                .apply_headers(self.http.post(&url))
                .json(body)
                .send()
                .await?;
            if response.status().as_u16() == 403 && !refreshed {
                tracing::debug!("{} returned 403, refreshing CSRF token and retrying", path);
                refreshed = true;
                self.fetch_csrf().await?;
                continue;
            }
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }
            return Self::parse_body(response).await;
        }
    }

    /// ボディ無しの POST リクエストを送る（ログアウトなど）
    pub async fn post_empty<T: DeserializeOwned>(&mut self, path: &str) -> Result<T, ApiError> {
        self.prefetch_csrf(path).await;
        let url = self.endpoint(path);
        let mut refreshed = false;
        loop {
            let response = self.apply_headers(self.http.post(&url)).send().await?;
            if response.status().as_u16() == 403 && !refreshed {
                tracing::debug!("{} returned 403, refreshing CSRF token and retrying", path);
                refreshed = true;
                self.fetch_csrf().await?;
                continue;
            }
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }
            return Self::parse_body(response).await;
        }
    }

    /// キャッシュ済みの CSRF トークンを破棄する（ログアウト後など）
    pub fn clear_csrf(&mut self) {
        self.csrf_token = None;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 全リクエスト共通のヘッダを付与する
    ///
    /// GET にも CSRF ヘッダを付けるのはバックエンドの挙動に合わせたもの。
    fn apply_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE);
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    /// 初回の状態変更リクエスト前に CSRF トークンを用意する
    ///
    /// 失敗してもここでは中断しない（本当に必要なら 403 再試行で取り直す）。
    async fn prefetch_csrf(&mut self, path: &str) {
        if self.csrf_token.is_none()
            && let Err(e) = self.fetch_csrf().await
        {
            tracing::debug!("CSRF prefetch before {} failed: {}", path, e);
        }
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let cookies = header.to_str().ok()?;
        cookies.split("; ").find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    async fn status_error(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(text) => serde_json::from_str::<ErrorBody>(&text).unwrap_or_default(),
            Err(_) => ErrorBody::default(),
        };
        ApiError::Status { status, body }
    }

    async fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        if text.is_empty() {
            // 空ボディは null として扱う（JSON を返さない 200 への耐性）
            return serde_json::from_value(serde_json::Value::Null).map_err(ApiError::InvalidBody);
        }
        serde_json::from_str(&text).map_err(ApiError::InvalidBody)
    }
}
