//! GraphQL client for the booking platform
//!
//! Single point of contact with the remote API. Owns the credential for the
//! duration of a run and enforces the authentication contract: on an
//! authorization failure with a refresh token held, exactly one refresh
//! followed by exactly one retry of the original request; anything beyond
//! that surfaces as a terminal auth error with a single operator alert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use deskbot_core::{BookingGateway, Notifier, TokenStore};
use deskbot_domain::{
    BookOutcome, Booking, Credential, DeskCandidate, DeskbotError, Moment, Result,
};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{
    AffectationsData, CreateAffectationData, DatedMoment, DeleteAffectationData, FavoritesData,
    GraphQLResponse, MeData, TokenRefreshRequest, TokenRefreshResponse, UserIdInput,
};
use crate::http::HttpClient;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Window used when ranking desks by booking frequency: this many days
/// back and ahead of today.
const FREQUENCY_WINDOW_DAYS: i64 = 90;

const ME_QUERY: &str = r#"
    query {
        me {
            id
        }
    }
"#;

const FAVORITES_QUERY: &str = r#"
    query userFavoriteSpacesAndDesks($userId: UserIdType!) {
        user(idV2: $userId) {
            id
            favoriteSpacesAndDesks {
                id
                space {
                    id
                    name
                }
                desk {
                    id
                    name
                }
            }
        }
    }
"#;

const AFFECTATIONS_QUERY: &str = r#"
    query affectationsByUserAndDates($userId: UserIdType!, $affectationsFilter: GetAffectationsFilter!) {
        user(idV2: $userId) {
            id
            affectations(affectationFilter: $affectationsFilter) {
                id
                date
                moment
                active
                desk {
                    id
                    name
                }
                space {
                    id
                    name
                }
            }
        }
    }
"#;

const CREATE_AFFECTATION_MUTATION: &str = r#"
    mutation createAffectation($data: CreateSimpleAffectationInput!) {
        createAffectation(data: $data) {
            id
        }
    }
"#;

const DELETE_AFFECTATION_MUTATION: &str = r#"
    mutation deleteAffectation($id: String!) {
        deleteAffectation(id: $id) {
            success
        }
    }
"#;

/// GraphQL booking gateway with token lifecycle management.
pub struct BookingApiClient {
    base_url: String,
    http: HttpClient,
    credential: RwLock<Credential>,
    token_store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    user_id: RwLock<Option<String>>,
}

impl BookingApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://booking.example.com/api`
    /// * `credential` - token pair loaded at startup
    /// * `token_store` - persistence for refreshed tokens
    /// * `notifier` - operator alerts on terminal auth failure
    ///
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        token_store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let http =
            HttpClient::builder().timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS)).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            credential: RwLock::new(credential),
            token_store,
            notifier,
            user_id: RwLock::new(None),
        })
    }

    fn gql_endpoint(&self) -> String {
        format!("{}/gql", self.base_url)
    }

    fn token_endpoint(&self) -> String {
        format!("{}/auth/token", self.base_url)
    }

    /// Issue one GraphQL POST with the current access token. No recovery
    /// here; `execute` layers the bounded 401 handling on top.
    async fn post_graphql(&self, query: &str, variables: Option<&Value>) -> Result<Response> {
        let mut body = json!({ "query": query });
        if let Some(vars) = variables {
            body["variables"] = vars.clone();
        }

        let token = self.credential.read().await.access_token.clone();
        let builder = self
            .http
            .request(Method::POST, self.gql_endpoint())
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .json(&body);

        self.http.send(builder).await
    }

    /// Execute a GraphQL query/mutation with bounded auth recovery.
    ///
    /// # Errors
    /// `DeskbotError::Auth` when the token is rejected and the single
    /// refresh-and-retry is exhausted; `Remote` for a GraphQL `errors`
    /// payload; `Network` for transport and non-2xx failures.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T> {
        let response = self.post_graphql(query, variables.as_ref()).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            self.recover_authorization(query, variables.as_ref()).await?
        } else {
            response
        };

        Self::parse_graphql(response).await
    }

    /// 401 recovery: at most one refresh and one retry of the original
    /// request. Every terminal path emits exactly one operator alert.
    async fn recover_authorization(
        &self,
        query: &str,
        variables: Option<&Value>,
    ) -> Result<Response> {
        if !self.credential.read().await.has_refresh() {
            let message = "access token rejected and no refresh token is available";
            self.notifier.send_token_expired_alert(message).await;
            return Err(DeskbotError::Auth(message.into()));
        }

        warn!("access token rejected, attempting refresh");
        if !self.refresh_access_token().await? {
            let message = "token refresh failed; re-authenticate via the SSO login flow";
            self.notifier.send_token_expired_alert(message).await;
            return Err(DeskbotError::Auth(message.into()));
        }

        let retry = self.post_graphql(query, variables).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            let message = "request still unauthorized after a successful token refresh";
            self.notifier.send_token_expired_alert(message).await;
            return Err(DeskbotError::Auth(message.into()));
        }
        Ok(retry)
    }

    async fn parse_graphql<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".into());
            let excerpt: String = body.chars().take(500).collect();
            return Err(DeskbotError::Network(format!(
                "booking API error (HTTP {status}): {excerpt}"
            )));
        }

        let envelope: GraphQLResponse<T> = response.json().await.map_err(|err| {
            DeskbotError::Internal(format!("failed to parse GraphQL response: {err}"))
        })?;

        if let Some(errors) = envelope.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(DeskbotError::Remote(messages.join(", ")));
        }

        envelope
            .data
            .ok_or_else(|| DeskbotError::Internal("GraphQL response missing data field".into()))
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// On success the in-memory credential is swapped (refresh token
    /// retained) and persisted through the token store; a persist failure
    /// is logged but never invalidates the in-memory update. Every failure
    /// mode comes back as `Ok(false)` so the caller decides how terminal it
    /// is; there is no retry in here.
    pub async fn refresh_access_token(&self) -> Result<bool> {
        let refresh_token = match self.credential.read().await.refresh_token.clone() {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!("no refresh token available");
                return Ok(false);
            }
        };

        let builder = self
            .http
            .request(Method::POST, self.token_endpoint())
            .json(&TokenRefreshRequest { grant_type: "refresh_token", refresh_token });

        let response = match self.http.send(builder).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "token refresh request failed");
                return Ok(false);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".into());
            let excerpt: String = body.chars().take(500).collect();
            warn!(%status, body = %excerpt, "token refresh rejected");
            return Ok(false);
        }

        let parsed: TokenRefreshResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "token endpoint returned an unparseable body");
                return Ok(false);
            }
        };

        let updated = {
            let mut credential = self.credential.write().await;
            credential.access_token = parsed.access_token;
            credential.clone()
        };

        if let Err(err) = self.token_store.save(&updated).await {
            warn!(error = %err, "failed to persist refreshed token, continuing with in-memory credential");
        }

        info!("access token refreshed");
        Ok(true)
    }

    /// The caller's user id, fetched once and cached for the run.
    async fn user_id(&self) -> Result<String> {
        if let Some(id) = self.user_id.read().await.clone() {
            return Ok(id);
        }

        let data: MeData = self.execute(ME_QUERY, None).await?;
        let id = data.me.id;
        *self.user_id.write().await = Some(id.clone());
        Ok(id)
    }

    /// Rank desks by booking frequency over the fixed window around today:
    /// descending count, ties broken by first-seen order in the query
    /// result.
    async fn ranked_by_frequency(&self) -> Result<Vec<DeskCandidate>> {
        let today = Local::now().date_naive();
        let window: Vec<NaiveDate> = (-FREQUENCY_WINDOW_DAYS..=FREQUENCY_WINDOW_DAYS)
            .map(|offset| today + chrono::Duration::days(offset))
            .collect();

        let bookings = self.bookings_for_dates(&window).await?;

        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut first_seen: Vec<DeskCandidate> = Vec::new();
        for booking in bookings {
            let (Some(desk), Some(space)) = (booking.desk, booking.space) else {
                continue;
            };
            let count = counts.entry(desk.id.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                first_seen.push(DeskCandidate {
                    display_name: desk.name.unwrap_or_else(|| format!("Desk {}", desk.id)),
                    desk_id: desk.id,
                    space_id: space.id,
                });
            }
        }

        // Stable sort keeps first-seen order among equal counts
        let mut ranked = first_seen;
        ranked.sort_by_key(|candidate| std::cmp::Reverse(counts[&candidate.desk_id]));

        if let Some(best) = ranked.first() {
            info!(
                desk = %best.display_name,
                bookings = counts[&best.desk_id],
                "no declared favorites, ranked desks by booking frequency"
            );
        }
        Ok(ranked)
    }
}

#[async_trait]
impl BookingGateway for BookingApiClient {
    async fn verify_identity(&self) -> Result<String> {
        let user_id = self.user_id().await?;
        debug!(%user_id, "access token accepted");
        Ok(user_id)
    }

    async fn favorite_desks(&self) -> Result<Vec<DeskCandidate>> {
        let user_id = self.user_id().await?;
        let variables = json!({ "userId": UserIdInput::internal(user_id) });
        let data: FavoritesData = self.execute(FAVORITES_QUERY, Some(variables)).await?;

        let favorites: Vec<DeskCandidate> = data
            .user
            .favorite_spaces_and_desks
            .into_iter()
            .filter_map(|pair| match (pair.desk, pair.space) {
                (Some(desk), Some(space)) => Some(DeskCandidate {
                    display_name: desk.name.unwrap_or_else(|| "Favorite desk".to_string()),
                    desk_id: desk.id,
                    space_id: space.id,
                }),
                _ => None,
            })
            .collect();

        if !favorites.is_empty() {
            debug!(count = favorites.len(), "using declared favorite desks");
            return Ok(favorites);
        }

        self.ranked_by_frequency().await
    }

    async fn bookings_for_dates(&self, dates: &[NaiveDate]) -> Result<Vec<Booking>> {
        let user_id = self.user_id().await?;
        let wire_dates: Vec<String> =
            dates.iter().map(|d| d.format(WIRE_DATE_FORMAT).to_string()).collect();
        let variables = json!({
            "userId": UserIdInput::internal(user_id),
            "affectationsFilter": {
                "dates": wire_dates,
                "withAuthoredSuggestions": true,
            },
        });

        let data: AffectationsData = self.execute(AFFECTATIONS_QUERY, Some(variables)).await?;
        Ok(data.user.affectations)
    }

    async fn has_booking_on_date(&self, date: NaiveDate, desk_id: Option<&str>) -> Result<bool> {
        let bookings = self.bookings_for_dates(&[date]).await?;
        Ok(bookings.iter().any(|booking| {
            booking.active
                && desk_id
                    .map_or(true, |id| booking.desk.as_ref().is_some_and(|desk| desk.id == id))
        }))
    }

    async fn book_desk(
        &self,
        candidate: &DeskCandidate,
        date: NaiveDate,
        moments: &[Moment],
    ) -> Result<BookOutcome> {
        // Idempotence: never issue a creation mutation when any active
        // booking already covers the date.
        match self.has_booking_on_date(date, None).await {
            Ok(true) => {
                debug!(%date, "active booking already exists, skipping creation");
                return Ok(BookOutcome::AlreadyExisted);
            }
            Ok(false) => {}
            Err(err @ DeskbotError::Auth(_)) => return Err(err),
            Err(err) => {
                warn!(%date, error = %err, "could not check existing bookings");
                return Ok(BookOutcome::Failed);
            }
        }

        let user_id = match self.user_id().await {
            Ok(id) => id,
            Err(err @ DeskbotError::Auth(_)) => return Err(err),
            Err(err) => {
                warn!(%date, error = %err, "could not resolve user id");
                return Ok(BookOutcome::Failed);
            }
        };

        let wire_date = date.format(WIRE_DATE_FORMAT).to_string();
        let dated_moments: Vec<DatedMoment> = moments
            .iter()
            .map(|&moment| DatedMoment { date: wire_date.clone(), moment })
            .collect();
        let user = UserIdInput::internal(user_id);
        let variables = json!({
            "data": {
                "type": "OFFICE",
                "datedMoments": dated_moments,
                "mainUserIdV2": user.clone(),
                "usersIdV2": [user],
                "teams": [],
                "guestsInfo": [],
                "spacesIdSelection": [candidate.space_id],
                "deskId": candidate.desk_id,
                "services": [],
                "desksAttributions": [],
                "withUsersSelectedDays": true,
            },
        });

        match self.execute::<CreateAffectationData>(CREATE_AFFECTATION_MUTATION, Some(variables)).await
        {
            Ok(data) => {
                info!(
                    %date,
                    desk = %candidate.display_name,
                    affectation_id = %data.create_affectation.id,
                    "booking created"
                );
                Ok(BookOutcome::Created)
            }
            Err(err @ DeskbotError::Auth(_)) => Err(err),
            Err(err) => {
                warn!(%date, desk = %candidate.display_name, error = %err, "booking attempt failed");
                Ok(BookOutcome::Failed)
            }
        }
    }

    async fn cancel_booking(&self, booking_id: &str) -> Result<bool> {
        let variables = json!({ "id": booking_id });
        match self.execute::<DeleteAffectationData>(DELETE_AFFECTATION_MUTATION, Some(variables)).await
        {
            Ok(data) => Ok(data.delete_affectation.success),
            Err(err @ DeskbotError::Auth(_)) => Err(err),
            Err(err) => {
                warn!(%booking_id, error = %err, "cancellation request failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::token_store::MemoryTokenStore;

    #[derive(Default)]
    struct CountingNotifier {
        alerts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send_booking_success(&self, _count: u32, _weeks: u32, _dates: &[NaiveDate]) {}

        async fn send_token_expired_alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }

        async fn send_vacation_cancellation(&self, _bookings: &[Booking]) {}

        async fn send_daily_reminder(&self, _bookings: &[Booking]) {}
    }

    struct Harness {
        server: MockServer,
        client: BookingApiClient,
        store: Arc<MemoryTokenStore>,
        notifier: Arc<CountingNotifier>,
    }

    async fn harness(refresh_token: Option<&str>) -> Harness {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryTokenStore::default());
        let notifier = Arc::new(CountingNotifier::default());
        let credential =
            Credential::new("initial-token".into(), refresh_token.map(str::to_string));
        let client = BookingApiClient::new(
            server.uri(),
            credential,
            store.clone(),
            notifier.clone(),
        )
        .expect("client");

        Harness { server, client, store, notifier }
    }

    fn me_body() -> serde_json::Value {
        json!({ "data": { "me": { "id": "user-1" } } })
    }

    fn affectations_body(affectations: serde_json::Value) -> serde_json::Value {
        json!({ "data": { "user": { "id": "user-1", "affectations": affectations } } })
    }

    fn desk(id: &str) -> DeskCandidate {
        DeskCandidate {
            desk_id: id.to_string(),
            space_id: format!("space-{id}"),
            display_name: format!("Desk {id}"),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn mount_me(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("me {"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me_body()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn verify_identity_sends_bearer_token() {
        let h = harness(None).await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(header("Authorization", "Bearer initial-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me_body()))
            .expect(1)
            .mount(&h.server)
            .await;

        let user_id = h.client.verify_identity().await.expect("identity");
        assert_eq!(user_id, "user-1");

        // A second call is served from the cache
        let user_id = h.client.verify_identity().await.expect("identity");
        assert_eq!(user_id, "user-1");
    }

    #[tokio::test]
    async fn book_desk_is_idempotent_across_two_calls() {
        let h = harness(None).await;
        mount_me(&h.server).await;

        // First has-booking check sees an empty day, later checks see the
        // booking the first call created.
        let affectation_calls = Arc::new(AtomicU32::new(0));
        let calls = affectation_calls.clone();
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("affectationsByUserAndDates"))
            .respond_with(move |_req: &Request| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                let affectations = if call == 0 {
                    json!([])
                } else {
                    json!([{
                        "id": "aff-1",
                        "date": "2026-03-04",
                        "moment": "MORNING",
                        "active": true,
                        "desk": { "id": "a", "name": "Desk a" },
                        "space": { "id": "space-a", "name": "Space" }
                    }])
                };
                ResponseTemplate::new(200).set_body_json(affectations_body(affectations))
            })
            .mount(&h.server)
            .await;

        // The creation mutation must be issued exactly once
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("createAffectation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "createAffectation": { "id": "aff-1" } }
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let target = date("2026-03-04");
        let first =
            h.client.book_desk(&desk("a"), target, &Moment::full_day()).await.expect("first");
        let second =
            h.client.book_desk(&desk("a"), target, &Moment::full_day()).await.expect("second");

        assert_eq!(first, BookOutcome::Created);
        assert_eq!(second, BookOutcome::AlreadyExisted);
    }

    #[tokio::test]
    async fn has_booking_respects_desk_filter_and_active_flag() {
        let h = harness(None).await;
        mount_me(&h.server).await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("affectationsByUserAndDates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(affectations_body(json!([
                {
                    "id": "aff-1",
                    "date": "2026-03-04",
                    "moment": "MORNING",
                    "active": true,
                    "desk": { "id": "a", "name": "Desk a" },
                    "space": { "id": "space-a", "name": "Space" }
                },
                {
                    "id": "aff-2",
                    "date": "2026-03-04",
                    "moment": "AFTERNOON",
                    "active": false,
                    "desk": { "id": "b", "name": "Desk b" },
                    "space": { "id": "space-b", "name": "Space" }
                }
            ]))))
            .mount(&h.server)
            .await;

        let target = date("2026-03-04");
        assert!(h.client.has_booking_on_date(target, None).await.unwrap());
        assert!(h.client.has_booking_on_date(target, Some("a")).await.unwrap());
        // Desk b's booking is inactive, desk c has none
        assert!(!h.client.has_booking_on_date(target, Some("b")).await.unwrap());
        assert!(!h.client.has_booking_on_date(target, Some("c")).await.unwrap());
    }

    #[tokio::test]
    async fn declared_favorites_win_over_frequency_ranking() {
        let h = harness(None).await;
        mount_me(&h.server).await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("favoriteSpacesAndDesks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "user": {
                    "id": "user-1",
                    "favoriteSpacesAndDesks": [
                        {
                            "id": "fav-1",
                            "desk": { "id": "d-9", "name": "Window desk" },
                            "space": { "id": "s-9", "name": "Floor 2" }
                        },
                        { "id": "fav-2", "desk": null, "space": { "id": "s-0" } }
                    ]
                } }
            })))
            .mount(&h.server)
            .await;

        let candidates = h.client.favorite_desks().await.expect("favorites");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].desk_id, "d-9");
        assert_eq!(candidates[0].space_id, "s-9");
        assert_eq!(candidates[0].display_name, "Window desk");
    }

    #[tokio::test]
    async fn frequency_fallback_ranks_by_count_then_first_seen() {
        let h = harness(None).await;
        mount_me(&h.server).await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("favoriteSpacesAndDesks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "user": { "id": "user-1", "favoriteSpacesAndDesks": [] } }
            })))
            .mount(&h.server)
            .await;

        let booking = |id: &str, desk: &str| {
            json!({
                "id": id,
                "date": "2026-03-04",
                "moment": "MORNING",
                "active": true,
                "desk": { "id": desk, "name": format!("Desk {desk}") },
                "space": { "id": format!("space-{desk}"), "name": "Space" }
            })
        };
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("affectationsByUserAndDates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(affectations_body(json!([
                booking("1", "a"),
                booking("2", "b"),
                booking("3", "b"),
                booking("4", "c"),
            ]))))
            .mount(&h.server)
            .await;

        let candidates = h.client.favorite_desks().await.expect("ranking");
        let ids: Vec<&str> = candidates.iter().map(|c| c.desk_id.as_str()).collect();
        // b has two bookings; a and c tie and keep first-seen order
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_request_retried_once() {
        let h = harness(Some("refresh-1")).await;

        // Old token is rejected, refreshed token is accepted
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(header("Authorization", "Bearer initial-token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(header("Authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me_body()))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let user_id = h.client.verify_identity().await.expect("recovered identity");
        assert_eq!(user_id, "user-1");

        // The refreshed credential was persisted with the refresh token intact
        let saved = h.store.load().await.unwrap().expect("persisted credential");
        assert_eq!(saved.access_token, "fresh-token");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));

        // No operator alert on a successful recovery
        assert!(h.notifier.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_is_terminal_with_a_single_alert() {
        let h = harness(Some("refresh-1")).await;

        Mock::given(method("POST"))
            .and(path("/gql"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h.client.verify_identity().await.unwrap_err();
        assert!(matches!(err, DeskbotError::Auth(_)));
        assert_eq!(h.notifier.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_still_unauthorized_is_terminal_without_second_refresh() {
        let h = harness(Some("refresh-1")).await;

        // Every request 401s, even with the fresh token
        Mock::given(method("POST"))
            .and(path("/gql"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h.client.verify_identity().await.unwrap_err();
        assert!(matches!(err, DeskbotError::Auth(_)));
        // Exactly one alert, exactly one refresh, exactly one retry
        assert_eq!(h.notifier.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_touching_token_endpoint() {
        let h = harness(None).await;

        Mock::given(method("POST"))
            .and(path("/gql"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = h.client.verify_identity().await.unwrap_err();
        assert!(matches!(err, DeskbotError::Auth(_)));
        assert_eq!(h.notifier.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn graphql_errors_payload_fails_the_single_booking_attempt() {
        let h = harness(None).await;
        mount_me(&h.server).await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("affectationsByUserAndDates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(affectations_body(json!([]))))
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("createAffectation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Desk already taken" }]
            })))
            .mount(&h.server)
            .await;

        let outcome = h
            .client
            .book_desk(&desk("a"), date("2026-03-04"), &Moment::full_day())
            .await
            .expect("outcome");
        assert_eq!(outcome, BookOutcome::Failed);
    }

    #[tokio::test]
    async fn cancel_booking_returns_platform_success_flag() {
        let h = harness(None).await;
        Mock::given(method("POST"))
            .and(path("/gql"))
            .and(body_string_contains("deleteAffectation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "deleteAffectation": { "success": true } }
            })))
            .mount(&h.server)
            .await;

        assert!(h.client.cancel_booking("aff-1").await.unwrap());
    }

    #[tokio::test]
    async fn refresh_access_token_reports_failure_without_erroring() {
        let h = harness(Some("refresh-1")).await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&h.server)
            .await;

        assert!(!h.client.refresh_access_token().await.unwrap());
        // In-memory credential is untouched on failure
        assert!(h.store.load().await.unwrap().is_none());
    }
}
