use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{TimeZone, Utc};
use student_registry::{
    web, MemoryStudentStore, NewStudent, PinPolicy, StoreError, StudentRecord, StudentStore,
};
use tokio::sync::Semaphore;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use uuid::Uuid;

const ASHA: &str = "name=Asha&phone=9876543210&email=a@b.com&college=XYZ&department=Computer+Science&year=2nd+Year";

/// Drives the router like a browser tab: one cookie jar, one session.
struct Tab {
    app: Router,
    cookie: Option<String>,
}

impl Tab {
    fn new(app: &Router) -> Self {
        Self {
            app: app.clone(),
            cookie: None,
        }
    }

    /// A request carrying this tab's cookie, for sending outside the tab.
    fn request(&self, method: &str, uri: &str, form: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match form {
            Some(form) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(&mut self, request: Request<Body>) -> Response {
        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
            self.cookie = match pair.split_once('=') {
                Some((_, value)) if !value.is_empty() => Some(pair),
                _ => None,
            };
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        let request = self.request("GET", uri, None);
        self.send(request).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Response {
        let request = self.request("POST", uri, Some(form));
        self.send(request).await
    }
}

fn app_with(store: Arc<dyn StudentStore>) -> Router {
    web::app(
        web::AppState::new(store, PinPolicy::default()),
        MemoryStore::default(),
        false,
    )
}

/// A store whose inserts wait until the test lets them through.
#[derive(Debug)]
struct HeldStore {
    inner: MemoryStudentStore,
    releases: Semaphore,
    waiting: AtomicUsize,
}

impl HeldStore {
    fn new() -> Self {
        Self {
            inner: MemoryStudentStore::new(),
            releases: Semaphore::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    async fn wait_for_insert(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.waiting.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("an insert reached the store");
    }
}

#[async_trait::async_trait]
impl StudentStore for HeldStore {
    async fn insert(&self, student: &NewStudent) -> Result<Uuid, StoreError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _release = self
            .releases
            .acquire()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        self.inner.insert(student).await
    }

    async fn select_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        self.inner.select_all().await
    }
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn record(name: &str, email: &str, college: &str, department: &str, minute: u32) -> StudentRecord {
    StudentRecord {
        id: Uuid::new_v4(),
        name: name.into(),
        phone: "9876543210".into(),
        email: email.into(),
        college: college.into(),
        department: department.into(),
        year: "1st Year".into(),
        created_at: Utc.with_ymd_and_hms(2025, 3, 7, 10, minute, 0).unwrap(),
    }
}

fn seeded_store() -> Arc<MemoryStudentStore> {
    Arc::new(MemoryStudentStore::with_records(vec![
        record("Asha", "asha@uni.edu", "XYZ College", "Computer Science", 1),
        record("Ravi", "ravi@mail.com", "ABC Institute", "Civil", 2),
        record("Meera", "meera@abc.org", "Delta Tech", "Electronics", 3),
        record("Kiran", "kiran@uni.edu", "Xylo Academy", "Mechanical", 4),
        record("Divya", "divya@mail.com", "Delta Tech", "Computer Science", 5),
    ]))
}

async fn unlocked_tab(app: &Router) -> Tab {
    let mut tab = Tab::new(app);
    let response = tab.post("/unlock", "pin=125").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    tab
}

async fn json_rows(tab: &mut Tab, uri: &str) -> Vec<StudentRecord> {
    let response = tab.get(uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn successful_registration_stores_record_and_resets_form() {
    let store = Arc::new(MemoryStudentStore::new());
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    let response = tab.post("/", ASHA).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    assert_eq!(store.insert_calls(), 1);
    let records = store.select_all().await.unwrap();
    assert_eq!(records.len(), 1);
    let stored = &records[0];
    assert_eq!(stored.name, "Asha");
    assert_eq!(stored.phone, "9876543210");
    assert_eq!(stored.email, "a@b.com");
    assert_eq!(stored.college, "XYZ");
    assert_eq!(stored.department, "Computer Science");
    assert_eq!(stored.year, "2nd Year");

    let page = body_text(tab.get("/").await).await;
    assert!(page.contains("Form submitted successfully!"));
    assert!(page.contains(r#"id="name" name="name" placeholder="Full Name" value="""#));
    assert!(page.contains(r#"http-equiv="refresh""#));
}

#[tokio::test]
async fn invalid_registration_never_reaches_the_store() {
    let store = Arc::new(MemoryStudentStore::new());
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    let form = ASHA.replace("email=a@b.com", "email=a@b");
    let response = tab.post("/", &form).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let page = body_text(response).await;
    assert!(page.contains("Enter a valid email address"));
    assert!(page.contains(r#"value="Asha""#));
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn phone_input_is_filtered_before_validation() {
    let store = Arc::new(MemoryStudentStore::new());
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    let form = ASHA.replace("phone=9876543210", "phone=98765-43210-77");
    let response = tab.post("/", &form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.select_all().await.unwrap()[0].phone, "9876543210");

    let short = ASHA.replace("phone=9876543210", "phone=98765");
    let response = tab.post("/", &short).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Must be exactly 10 digits"));
    assert_eq!(store.insert_calls(), 1);
}

#[tokio::test]
async fn store_failure_is_shown_and_form_kept_for_retry() {
    let store = Arc::new(MemoryStudentStore::new());
    store.fail_writes(true);
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    let response = tab.post("/", ASHA).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(tab.cookie.is_some());
    let page = body_text(response).await;
    assert!(page.contains("insert rejected by memory store"));
    assert!(page.contains(r#"value="Asha""#));
    assert!(!page.contains("Form submitted successfully!"));

    let page = body_text(tab.get("/").await).await;
    assert!(page.contains(r#"value="9876543210""#));

    store.fail_writes(false);
    let response = tab.post("/", ASHA).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.insert_calls(), 2);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn existing_session_can_retry_after_store_failure() {
    let store = Arc::new(MemoryStudentStore::new());
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    let incomplete = ASHA.replace("college=XYZ", "college=");
    let response = tab.post("/", &incomplete).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(tab.cookie.is_some());

    store.fail_writes(true);
    let response = tab.post("/", ASHA).await;
    assert!(body_text(response).await.contains("insert rejected by memory store"));
    assert_eq!(store.insert_calls(), 1);

    store.fail_writes(false);
    for attempt in 0..3 {
        let form = ASHA.replace("name=Asha", &format!("name=Asha{attempt}"));
        let response = tab.post("/", &form).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "attempt {attempt}");
    }
    assert_eq!(store.insert_calls(), 4);
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn concurrent_submission_is_refused_until_the_first_completes() {
    let store = Arc::new(HeldStore::new());
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    // An incomplete form is enough to give the tab its session
    let incomplete = ASHA.replace("email=a@b.com", "email=");
    let response = tab.post("/", &incomplete).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let first = tokio::spawn(app.clone().oneshot(tab.request("POST", "/", Some(ASHA))));
    store.wait_for_insert().await;

    let response = tab.post("/", ASHA).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_text(response).await.contains("already in progress"));
    assert_eq!(store.waiting.load(Ordering::SeqCst), 1);

    store.releases.add_permits(1);
    let response = first.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = tab.post("/", ASHA).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.waiting.load(Ordering::SeqCst), 2);
    assert_eq!(store.inner.len().await, 2);
}

#[tokio::test]
async fn locked_gate_never_reaches_the_store() {
    let store = seeded_store();
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    for uri in ["/dashboard", "/dashboard?q=asha", "/dashboard/export", "/dashboard/records.json"] {
        let response = tab.get(uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/", "{uri}");
    }
    let response = tab.post("/dashboard/refresh", "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    assert_eq!(store.select_calls(), 0);
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn wrong_pin_keeps_the_gate_locked() {
    let store = seeded_store();
    let app = app_with(store.clone());
    let mut tab = Tab::new(&app);

    for pin in ["1", "12", "124", "1234", "9999", "0125"] {
        let response = tab.post("/unlock", &format!("pin={pin}")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{pin}");
        let page = body_text(response).await;
        assert!(page.contains("Invalid PIN"));
        assert!(!page.contains(&format!(r#"value="{pin}""#)));
    }

    let response = tab.get("/dashboard").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.select_calls(), 0);
}

#[tokio::test]
async fn correct_pin_unlocks_and_fetches_once() {
    let store = seeded_store();
    let app = app_with(store.clone());
    let mut tab = unlocked_tab(&app).await;
    assert_eq!(store.select_calls(), 1);

    let page = body_text(tab.get("/dashboard").await).await;
    assert!(page.contains(r#"<p id="total">5</p>"#));
    assert!(page.contains(r#"<p id="latest">Divya</p>"#));
    assert!(page.contains("3/7/2025, 10:05:00 AM"));

    let response = tab.get("/unlock").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    assert_eq!(store.select_calls(), 1);
}

#[tokio::test]
async fn pin_input_is_filtered_to_digits() {
    let app = app_with(seeded_store());
    let mut tab = Tab::new(&app);
    let response = tab.post("/unlock", "pin=1a2b5").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn gate_is_scoped_to_the_session() {
    let app = app_with(seeded_store());
    let _admin = unlocked_tab(&app).await;

    let mut other = Tab::new(&app);
    let response = other.get("/dashboard").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn search_filters_the_snapshot_without_refetching() {
    let store = seeded_store();
    let app = app_with(store.clone());
    let mut tab = unlocked_tab(&app).await;

    assert_eq!(json_rows(&mut tab, "/dashboard/records.json").await.len(), 5);
    assert_eq!(json_rows(&mut tab, "/dashboard/records.json?q=UNI.EDU").await.len(), 2);
    assert_eq!(json_rows(&mut tab, "/dashboard/records.json?q=delta").await.len(), 2);
    assert_eq!(json_rows(&mut tab, "/dashboard/records.json?q=computer").await.len(), 2);
    assert!(json_rows(&mut tab, "/dashboard/records.json?q=zzz").await.is_empty());
    assert_eq!(json_rows(&mut tab, "/dashboard/records.json?q=").await.len(), 5);

    let page = body_text(tab.get("/dashboard?q=zzz").await).await;
    assert!(page.contains(r#"<tr id="no-records">"#));
    assert!(page.contains(r#"<p id="total">5</p>"#));

    assert_eq!(store.select_calls(), 1);
}

#[tokio::test]
async fn export_ignores_the_search_filter() {
    let store = seeded_store();
    let app = app_with(store.clone());
    let mut tab = unlocked_tab(&app).await;

    let _ = tab.get("/dashboard?q=ravi").await;
    let response = tab.get("/dashboard/export").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"student_records.xlsx\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));

    assert_eq!(store.select_calls(), 1);
}

#[tokio::test]
async fn failed_fetch_degrades_to_an_empty_flagged_dashboard() {
    let store = seeded_store();
    store.fail_reads(true);
    let app = app_with(store.clone());
    let mut tab = unlocked_tab(&app).await;

    let page = body_text(tab.get("/dashboard").await).await;
    assert!(page.contains("Records could not be loaded"));
    assert!(page.contains(r#"<p id="total">0</p>"#));
    assert!(page.contains("No records found"));

    store.fail_reads(false);
    let response = tab.post("/dashboard/refresh", "").await;
    assert_eq!(location(&response), "/dashboard");
    let page = body_text(tab.get("/dashboard").await).await;
    assert!(!page.contains("Records could not be loaded"));
    assert!(page.contains(r#"<p id="total">5</p>"#));
}

#[tokio::test]
async fn refresh_picks_up_new_submissions() {
    let store = seeded_store();
    let app = app_with(store.clone());
    let mut tab = unlocked_tab(&app).await;

    let mut student = Tab::new(&app);
    assert_eq!(student.post("/", ASHA).await.status(), StatusCode::SEE_OTHER);

    assert_eq!(json_rows(&mut tab, "/dashboard/records.json").await.len(), 5);
    let response = tab.post("/dashboard/refresh", "").await;
    assert_eq!(location(&response), "/dashboard");

    let rows = json_rows(&mut tab, "/dashboard/records.json").await;
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].email, "a@b.com");
    assert_eq!(store.select_calls(), 2);
}

#[tokio::test]
async fn lock_and_cancel_lead_back_to_the_form() {
    let app = app_with(seeded_store());
    let mut tab = unlocked_tab(&app).await;

    let response = tab.post("/lock", "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = tab.get("/dashboard").await;
    assert_eq!(location(&response), "/");

    let response = tab.get("/unlock/cancel").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let page = body_text(tab.get("/unlock").await).await;
    assert!(page.contains("Admin Access"));
}
