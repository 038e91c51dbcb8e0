//! FluxCP session and mob database lookup against local HTTP stand-ins.

use axum::extract::{Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::{TimeZone, Utc};
use mvptimer_devkit::init_test_logging;
use mvptimer_kernel::models::RespawnWindow;
use mvptimer_kernel::source::{
    Credentials, FluxCpSource, MobDbLookup, ScrapeSource, SourceError, WindowLookup,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

type Params = HashMap<String, String>;

const SESSION: &str = "fluxSessionData=abc123";

const RANKING: &str = r#"<html><body>
    <table class="horizontal-table">
      <tr><th>Date</th><th>Player</th><th>Monster</th><th>EXP</th><th>Map</th></tr>
      <tr>
        <td>2024-03-10 12:05:09</td><td>Alice</td>
        <td><a href="?module=monster&amp;id=1039">Baphomet</a></td>
        <td>0</td><td>prt_maze03</td>
      </tr>
      <tr>
        <td>2024-03-10 11:00:00</td><td>Bob</td>
        <td><a href="?module=monster&amp;id=1038">Osiris</a></td>
        <td>0</td><td>moc_pryd04</td>
      </tr>
    </table>
    </body></html>"#;

const LOGIN_FORM: &str = r#"<html><body><form class="login">
    <input name="username"><input name="password">
    </form></body></html>"#;

const MOB_PAGE: &str = r#"<html><body><table><tr><th>Spawn</th><td>
    <div><a href="map_db.php?map=prt_maze03">prt_maze03</a> <span>x1 / 120~130 min</span></div>
    <div><a href="map_db.php?map=gl_chyard">gl_chyard</a> <span>x1 / 60 min</span></div>
    </td></tr></table></body></html>"#;

#[derive(Default)]
struct FakeSite {
    requests: Mutex<Vec<String>>,
    login_forms: Mutex<Vec<Params>>,
    mob_queries: Mutex<Vec<Params>>,
    ranking_down: AtomicBool,
}

impl FakeSite {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn record(&self, method: &str, query: &Params) {
        let module = query.get("module").map(String::as_str).unwrap_or("");
        let action = query.get("action").map(String::as_str).unwrap_or("");
        self.requests.lock().push(format!("{method} {module}/{action}"));
    }
}

async fn panel_get(
    State(site): State<Arc<FakeSite>>,
    Query(query): Query<Params>,
    headers: HeaderMap,
) -> Response {
    site.record("GET", &query);
    match (query.get("module").map(String::as_str), query.get("action").map(String::as_str)) {
        (Some("ranking"), Some("mvp")) => {
            if site.ranking_down.load(Ordering::SeqCst) {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            let logged_in = headers
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|cookies| cookies.contains(SESSION));
            if logged_in {
                Html(RANKING).into_response()
            } else {
                Html(LOGIN_FORM).into_response()
            }
        }
        (Some("account"), Some("logout")) => Html("bye").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn panel_post(
    State(site): State<Arc<FakeSite>>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Response {
    site.record("POST", &query);
    if query.get("action").map(String::as_str) != Some("login") {
        return StatusCode::NOT_FOUND.into_response();
    }
    if form.get("password").map(String::as_str) != Some("hunter2") {
        return StatusCode::FORBIDDEN.into_response();
    }
    site.login_forms.lock().push(form);
    (
        [(SET_COOKIE, format!("{SESSION}; Path=/"))],
        Html("welcome"),
    )
        .into_response()
}

async fn mob_db(State(site): State<Arc<FakeSite>>, Query(query): Query<Params>) -> Response {
    let known = query.get("mob_id").map(String::as_str) == Some("1039");
    site.mob_queries.lock().push(query);
    if known {
        Html(MOB_PAGE).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn serve(site: Arc<FakeSite>) -> SocketAddr {
    init_test_logging();
    let app = Router::new()
        .route("/", get(panel_get).post(panel_post))
        .route("/mob_db.php", get(mob_db))
        .with_state(site);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        server: "Renewal".to_string(),
        username: "tester".to_string(),
        password: password.to_string(),
    }
}

fn panel(addr: SocketAddr, password: &str) -> FluxCpSource {
    FluxCpSource::new(format!("http://{addr}/"), credentials(password), chrono_tz::UTC).unwrap()
}

#[tokio::test]
async fn test_login_cookie_carries_to_ranking_and_logout() {
    let site = Arc::new(FakeSite::default());
    let addr = serve(site.clone()).await;
    let source = panel(addr, "hunter2");

    // Without a session the panel serves its login form.
    let err = source.fetch_kill_rows().await.unwrap_err();
    assert!(matches!(err, SourceError::Layout(_)), "{err:?}");

    source.login().await.unwrap();
    let forms = site.login_forms.lock().clone();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["server"], "Renewal");
    assert_eq!(forms[0]["username"], "tester");
    assert_eq!(forms[0]["password"], "hunter2");

    let rows = source.fetch_kill_rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].monster_name, "Baphomet");
    assert_eq!(rows[0].monster_id, "1039");
    assert_eq!(rows[0].map_name, "prt_maze03");
    assert_eq!(rows[0].player.as_deref(), Some("Alice"));
    assert_eq!(
        rows[0].killed_at,
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 5, 9).unwrap()
    );

    source.close().await.unwrap();
    assert_eq!(
        site.requests(),
        [
            "GET ranking/mvp",
            "POST account/login",
            "GET ranking/mvp",
            "GET account/logout",
        ]
    );
}

#[tokio::test]
async fn test_reauthenticate_logs_in_again() {
    let site = Arc::new(FakeSite::default());
    let addr = serve(site.clone()).await;
    let source = panel(addr, "hunter2");

    source.reauthenticate().await.unwrap();
    assert_eq!(source.fetch_kill_rows().await.unwrap().len(), 2);
    assert_eq!(site.login_forms.lock().len(), 1);
}

#[tokio::test]
async fn test_rejected_login_and_ranking_error_map_to_status() {
    let site = Arc::new(FakeSite::default());
    let addr = serve(site.clone()).await;

    let err = panel(addr, "wrong").login().await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 403, .. }), "{err:?}");

    let source = panel(addr, "hunter2");
    source.login().await.unwrap();
    site.ranking_down.store(true, Ordering::SeqCst);
    match source.fetch_kill_rows().await.unwrap_err() {
        SourceError::Status { status, url } => {
            assert_eq!(status, 500);
            assert!(url.contains("module=ranking"), "{url}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mob_db_template_and_windows() {
    let site = Arc::new(FakeSite::default());
    let addr = serve(site.clone()).await;
    let lookup =
        MobDbLookup::new(format!("http://{addr}/mob_db.php?mob_id={{mob_id}}&small=1&back=1"))
            .unwrap();

    assert_eq!(
        lookup.lookup_window("1039", "prt_maze03").await.unwrap(),
        RespawnWindow::new(120, 130)
    );
    assert_eq!(
        lookup.lookup_window("1039", "gl_chyard").await.unwrap(),
        Some(RespawnWindow::fixed(60))
    );
    assert_eq!(lookup.lookup_window("1039", "pay_fild11").await.unwrap(), None);

    let queries = site.mob_queries.lock().clone();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0]["mob_id"], "1039");
    assert_eq!(queries[0]["small"], "1");
    assert_eq!(queries[0]["back"], "1");
}

#[tokio::test]
async fn test_mob_db_error_status() {
    let site = Arc::new(FakeSite::default());
    let addr = serve(site.clone()).await;
    let lookup =
        MobDbLookup::new(format!("http://{addr}/mob_db.php?mob_id={{mob_id}}&small=1")).unwrap();

    let err = lookup.lookup_window("9999", "prt_maze03").await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 404, .. }), "{err:?}");
    assert_eq!(site.mob_queries.lock()[0]["mob_id"], "9999");
}
