//! End-to-end tests for the GraphQL API
//!
//! These run operations against a schema backed by an in-memory database:
//! - auth gating of mutations
//! - author auto-creation and book filtering
//! - error codes and invalid arguments
//! - bookAdded delivery
//! - the HTTP routes, through the full router
//! - WebSocket auth and shutdown, against a running server

use std::sync::Arc;

use async_graphql::{Request, Response};
use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode, header};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use bookshelf::db::{Database, UserRecord};
use bookshelf::graphql::{BookshelfSchema, CurrentUser, build_schema};
use bookshelf::services::{AuthConfig, AuthService, BookEvents};
use bookshelf::{AppState, build_app, serve};

const SECRET: &str = "integration-test-secret";

struct TestApp {
    db: Database,
    auth: Arc<AuthService>,
    events: Arc<BookEvents>,
    schema: BookshelfSchema,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::connect_in_memory().await.unwrap();
        let auth = Arc::new(AuthService::new(
            db.clone(),
            AuthConfig {
                jwt_secret: SECRET.to_string(),
                token_lifetime: 3600,
                bcrypt_cost: 4,
            },
        ));
        let events = Arc::new(BookEvents::new(16));
        let schema = build_schema(db.clone(), auth.clone(), events.clone());
        Self {
            db,
            auth,
            events,
            schema,
        }
    }

    async fn user(&self, username: &str) -> UserRecord {
        self.auth
            .create_user(username, "refactoring", "secret-password")
            .await
            .unwrap()
    }

    async fn anonymous(&self, query: &str) -> Response {
        self.schema.execute(Request::new(query)).await
    }

    async fn as_user(&self, user: &UserRecord, query: &str) -> Response {
        self.schema
            .execute(Request::new(query).data(CurrentUser(user.clone())))
            .await
    }

    fn state(&self, shutdown: CancellationToken) -> AppState {
        AppState {
            db: self.db.clone(),
            schema: self.schema.clone(),
            auth: self.auth.clone(),
            shutdown,
        }
    }

    fn router(&self) -> axum::Router {
        build_app(self.state(CancellationToken::new()))
    }

    /// An auth service over the same database with different token settings
    fn auth_with(&self, jwt_secret: &str, token_lifetime: i64) -> AuthService {
        AuthService::new(
            self.db.clone(),
            AuthConfig {
                jwt_secret: jwt_secret.to_string(),
                token_lifetime,
                bcrypt_cost: 4,
            },
        )
    }
}

fn data(response: Response) -> Value {
    assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
    response.data.into_json().unwrap()
}

fn error_extensions(response: &Response) -> Value {
    assert_eq!(response.errors.len(), 1, "expected one error: {:?}", response.errors);
    serde_json::to_value(&response.errors[0].extensions).unwrap()
}

fn add_book(title: &str, author: &str, published: i32, genres: &[&str]) -> String {
    format!(
        r#"mutation {{
            addBook(bookObj: {{ title: {title:?}, author: {author:?}, published: {published}, genres: {genres:?} }}) {{
                title published genres id
                author {{ name born bookCount }}
            }}
        }}"#
    )
}

async fn seed(app: &TestApp, user: &UserRecord) {
    for (title, author, published, genres) in [
        ("Clean Code", "Robert Martin", 2008, &["refactoring"][..]),
        ("Agile software development", "Robert Martin", 2002, &["agile", "patterns", "design"][..]),
        ("Refactoring, edition 2", "Martin Fowler", 2018, &["refactoring"][..]),
        ("Crime and punishment", "Fyodor Dostoevsky", 1866, &["classic", "crime"][..]),
    ] {
        data(app.as_user(user, &add_book(title, author, published, genres)).await);
    }
}

// ============================================================================
// Auth gating
// ============================================================================

mod auth_gating {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_add_book_requires_user() {
        let app = TestApp::new().await;

        let response = app
            .anonymous(&add_book("Clean Code", "Robert Martin", 2008, &["refactoring"]))
            .await;

        assert_eq!(error_extensions(&response)["code"], "UNAUTHENTICATED");
        assert_eq!(app.db.books().count().await.unwrap(), 0);
        assert_eq!(app.db.authors().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_edit_author_requires_user() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        seed(&app, &user).await;

        let response = app
            .anonymous(r#"mutation { editAuthor(name: "Robert Martin", setBornTo: 1952) { name born } }"#)
            .await;

        assert_eq!(error_extensions(&response)["code"], "UNAUTHENTICATED");
        let author = app.db.authors().get_by_name("Robert Martin").await.unwrap().unwrap();
        assert_eq!(author.born, None);
    }

    #[tokio::test]
    async fn test_loggedin_user() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        let query = "{ loggedinUser { username favoriteGenre id } }";

        assert_eq!(data(app.anonymous(query).await), json!({ "loggedinUser": null }));
        assert_eq!(
            data(app.as_user(&user, query).await),
            json!({
                "loggedinUser": {
                    "username": "mluukkai",
                    "favoriteGenre": "refactoring",
                    "id": user.id,
                }
            })
        );
    }
}

// ============================================================================
// Books and authors
// ============================================================================

mod library {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_add_book_creates_author() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;

        let added = data(
            app.as_user(&user, &add_book("NoSQL Distilled", "New Author", 2012, &["database", "nosql"]))
                .await,
        );
        assert_eq!(added["addBook"]["title"], "NoSQL Distilled");
        assert_eq!(
            added["addBook"]["author"],
            json!({ "name": "New Author", "born": null, "bookCount": 1 })
        );

        let authors = data(app.anonymous("{ authorCount allAuthors { name born bookCount } }").await);
        assert_eq!(
            authors,
            json!({
                "authorCount": 1,
                "allAuthors": [{ "name": "New Author", "born": null, "bookCount": 1 }],
            })
        );
    }

    #[tokio::test]
    async fn test_existing_author_is_reused() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        seed(&app, &user).await;

        let result = data(
            app.anonymous(
                r#"{ bookCount authorCount allAuthors { name bookCount books { title } } }"#,
            )
            .await,
        );
        assert_eq!(result["bookCount"], 4);
        assert_eq!(result["authorCount"], 3);
        assert_eq!(
            result["allAuthors"][0],
            json!({
                "name": "Robert Martin",
                "bookCount": 2,
                "books": [{ "title": "Clean Code" }, { "title": "Agile software development" }],
            })
        );
    }

    #[tokio::test]
    async fn test_all_books_filters() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        seed(&app, &user).await;

        let titles = |value: Value| -> Vec<String> {
            value["allBooks"]
                .as_array()
                .unwrap()
                .iter()
                .map(|b| b["title"].as_str().unwrap().to_string())
                .collect()
        };

        let all = data(app.anonymous("{ allBooks { title } }").await);
        assert_eq!(titles(all).len(), 4);

        let by_author = data(app.anonymous(r#"{ allBooks(author: "Robert Martin") { title author { name } } }"#).await);
        assert_eq!(titles(by_author), vec!["Clean Code", "Agile software development"]);

        let by_genre = data(app.anonymous(r#"{ allBooks(genres: ["refactoring"]) { title } }"#).await);
        assert_eq!(titles(by_genre), vec!["Clean Code", "Refactoring, edition 2"]);

        let any_genre = data(app.anonymous(r#"{ allBooks(genres: ["crime", "agile"]) { title } }"#).await);
        assert_eq!(
            titles(any_genre),
            vec!["Agile software development", "Crime and punishment"]
        );

        let both = data(
            app.anonymous(r#"{ allBooks(author: "Robert Martin", genres: ["refactoring"]) { title } }"#)
                .await,
        );
        assert_eq!(titles(both), vec!["Clean Code"]);

        let empty_genres = data(app.anonymous(r#"{ allBooks(genres: []) { title } }"#).await);
        assert_eq!(titles(empty_genres).len(), 4);

        let unknown = data(app.anonymous(r#"{ allBooks(author: "Nobody Known") { title } }"#).await);
        assert_eq!(titles(unknown), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_duplicate_title_rejected() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        seed(&app, &user).await;

        let response = app
            .as_user(&user, &add_book("Clean Code", "Another Writer", 2020, &["refactoring"]))
            .await;

        let extensions = error_extensions(&response);
        assert_eq!(extensions["code"], "BAD_USER_INPUT");
        assert_eq!(extensions["invalidArgs"]["bookObj"]["title"], "Clean Code");
        assert_eq!(app.db.books().count().await.unwrap(), 4);
        assert_eq!(app.db.authors().get_by_name("Another Writer").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_edit_author() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        seed(&app, &user).await;

        let edited = data(
            app.as_user(&user, r#"mutation { editAuthor(name: "Robert Martin", setBornTo: 1952) { name born } }"#)
                .await,
        );
        assert_eq!(
            edited,
            json!({ "editAuthor": { "name": "Robert Martin", "born": 1952 } })
        );
    }

    #[tokio::test]
    async fn test_edit_unknown_author() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        seed(&app, &user).await;

        let response = app
            .as_user(&user, r#"mutation { editAuthor(name: "Nobody Known", setBornTo: 1900) { name } }"#)
            .await;

        assert_eq!(error_extensions(&response)["code"], "NOT_FOUND");
        let borns: Vec<Option<i32>> = app
            .db
            .authors()
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.born)
            .collect();
        assert_eq!(borns, vec![None, None, None]);
    }
}

// ============================================================================
// Users and login
// ============================================================================

mod users {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOGIN: &str = r#"mutation($password: String!) {
        login(credentials: { username: "mluukkai", password: $password }) { value }
    }"#;

    fn login(password: &str) -> Request {
        Request::new(LOGIN).variables(async_graphql::Variables::from_json(json!({ "password": password })))
    }

    #[tokio::test]
    async fn test_create_user_and_login() {
        let app = TestApp::new().await;

        let created = data(
            app.anonymous(
                r#"mutation {
                    createUser(user: { username: "mluukkai", favoriteGenre: "refactoring", password: "salainen" }) {
                        username favoriteGenre
                    }
                }"#,
            )
            .await,
        );
        assert_eq!(
            created,
            json!({ "createUser": { "username": "mluukkai", "favoriteGenre": "refactoring" } })
        );

        let token = data(app.schema.execute(login("salainen")).await);
        let value = token["login"]["value"].as_str().unwrap();
        let user = app.auth.resolve_token(value).await.unwrap().unwrap();
        assert_eq!(user.username, "mluukkai");
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let app = TestApp::new().await;
        app.auth
            .create_user("mluukkai", "refactoring", "salainen")
            .await
            .unwrap();

        let response = app.schema.execute(login("wrong")).await;
        assert_eq!(
            error_extensions(&response),
            json!({ "code": "BAD_USER_INPUT", "invalidArgs": { "username": "mluukkai" } })
        );
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let app = TestApp::new().await;
        app.user("mluukkai").await;

        let duplicate = app
            .anonymous(
                r#"mutation { createUser(user: { username: "mluukkai", favoriteGenre: "crime", password: "pw" }) { id } }"#,
            )
            .await;
        let extensions = error_extensions(&duplicate);
        assert_eq!(extensions["code"], "BAD_USER_INPUT");
        assert_eq!(extensions["field"], "username");

        let short = app
            .anonymous(
                r#"mutation { createUser(user: { username: "ab", favoriteGenre: "crime", password: "pw" }) { id } }"#,
            )
            .await;
        assert_eq!(error_extensions(&short)["code"], "BAD_USER_INPUT");
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

mod subscriptions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_book_added_delivered_once() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;

        let mut stream = app
            .schema
            .execute_stream("subscription { bookAdded { title author { name bookCount } } }");

        // Drive the subscription until it is registered with the channel
        while app.events.subscriber_count() == 0 {
            assert!(futures::poll!(stream.next()).is_pending());
            tokio::task::yield_now().await;
        }

        data(
            app.as_user(&user, &add_book("Clean Code", "Robert Martin", 2008, &["refactoring"]))
                .await,
        );

        let event = data(stream.next().await.unwrap());
        assert_eq!(
            event,
            json!({
                "bookAdded": {
                    "title": "Clean Code",
                    "author": { "name": "Robert Martin", "bookCount": 1 },
                }
            })
        );
        assert!(futures::poll!(stream.next()).is_pending());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_nothing() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;

        data(
            app.as_user(&user, &add_book("Clean Code", "Robert Martin", 2008, &["refactoring"]))
                .await,
        );

        let mut stream = app.schema.execute_stream("subscription { bookAdded { title } }");
        while app.events.subscriber_count() == 0 {
            assert!(futures::poll!(stream.next()).is_pending());
            tokio::task::yield_now().await;
        }
        assert!(futures::poll!(stream.next()).is_pending());
    }
}

// ============================================================================
// HTTP routes
// ============================================================================

mod http {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn post_graphql(app: &TestApp, query: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = HttpRequest::post("/graphql").header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap();

        let response = app.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_routes() {
        let app = TestApp::new().await;

        for path in ["/healthz", "/readyz"] {
            let response = app
                .router()
                .oneshot(HttpRequest::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn test_bearer_token_authenticates() {
        let app = TestApp::new().await;
        app.auth
            .create_user("mluukkai", "refactoring", "salainen")
            .await
            .unwrap();
        let token = app.auth.login("mluukkai", "salainen").await.unwrap();

        let (status, body) = post_graphql(&app, "{ loggedinUser { username } }", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({ "loggedinUser": { "username": "mluukkai" } }));

        let (_, body) = post_graphql(&app, "{ loggedinUser { username } }", None).await;
        assert_eq!(body["data"], json!({ "loggedinUser": null }));
    }

    #[tokio::test]
    async fn test_expired_token_fails_request() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        let expired = app.auth_with(SECRET, -60).issue_token(&user).unwrap();

        let (_, body) = post_graphql(&app, "{ loggedinUser { username } }", Some(&expired)).await;
        assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
        assert_eq!(body.get("data").cloned().unwrap_or(Value::Null), Value::Null);
    }

    #[tokio::test]
    async fn test_foreign_token_fails_request() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        let foreign = app.auth_with("some-other-secret", 3600).issue_token(&user).unwrap();

        let (_, body) = post_graphql(&app, "{ loggedinUser { username } }", Some(&foreign)).await;
        assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_malformed_token_fails_request() {
        let app = TestApp::new().await;

        let (_, body) = post_graphql(&app, "{ bookCount }", Some("not-a-token")).await;
        assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
        assert_eq!(body.get("data").cloned().unwrap_or(Value::Null), Value::Null);
    }
}

// ============================================================================
// WebSocket
// ============================================================================

mod ws {
    use std::net::SocketAddr;
    use std::time::Duration;

    use futures::SinkExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    use super::*;
    use pretty_assertions::assert_eq;

    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(5);

    struct Server {
        addr: SocketAddr,
        shutdown: CancellationToken,
        handle: JoinHandle<std::io::Result<()>>,
    }

    async fn start(app: &TestApp) -> Server {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, app.state(shutdown.clone())));
        Server {
            addr,
            shutdown,
            handle,
        }
    }

    async fn connect(addr: SocketAddr, header_token: Option<&str>) -> Result<Socket, WsError> {
        let mut request = format!("ws://{addr}/graphql/ws").into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static("graphql-transport-ws"),
        );
        if let Some(token) = header_token {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            );
        }
        connect_async(request).await.map(|(socket, _)| socket)
    }

    async fn send(socket: &mut Socket, message: Value) {
        socket.send(Message::Text(message.to_string())).await.unwrap();
    }

    /// Next JSON text frame, or `None` once the server closes the connection
    async fn next_json(socket: &mut Socket) -> Option<Value> {
        loop {
            match timeout(WAIT, socket.next()).await.expect("timed out waiting for frame") {
                Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(other)) => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    async fn init(socket: &mut Socket, payload: Value) -> Option<Value> {
        send(socket, json!({ "type": "connection_init", "payload": payload })).await;
        next_json(socket).await
    }

    async fn loggedin_username(socket: &mut Socket) -> Value {
        send(
            socket,
            json!({
                "id": "1",
                "type": "subscribe",
                "payload": { "query": "{ loggedinUser { username } }" },
            }),
        )
        .await;
        let next = next_json(socket).await.unwrap();
        assert_eq!(next["type"], "next");
        next["payload"]["data"]["loggedinUser"]["username"].clone()
    }

    #[tokio::test]
    async fn test_bad_header_token_rejects_upgrade() {
        let app = TestApp::new().await;
        let server = start(&app).await;

        match connect(server.addr, Some("not-a-token")).await {
            Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("upgrade should be refused"),
        }
        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_header_token_authenticates_connection() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        let token = app.auth.issue_token(&user).unwrap();
        let server = start(&app).await;

        let mut socket = connect(server.addr, Some(&token)).await.unwrap();
        assert_eq!(init(&mut socket, json!({})).await.unwrap()["type"], "connection_ack");
        assert_eq!(loggedin_username(&mut socket).await, "mluukkai");
        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_connection_init_token_authenticates() {
        let app = TestApp::new().await;
        let user = app.user("mluukkai").await;
        let token = app.auth.issue_token(&user).unwrap();
        let server = start(&app).await;

        let mut socket = connect(server.addr, None).await.unwrap();
        let ack = init(&mut socket, json!({ "Authorization": format!("Bearer {token}") })).await;
        assert_eq!(ack.unwrap()["type"], "connection_ack");
        assert_eq!(loggedin_username(&mut socket).await, "mluukkai");
        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_anonymous_connection() {
        let app = TestApp::new().await;
        let server = start(&app).await;

        let mut socket = connect(server.addr, None).await.unwrap();
        assert_eq!(init(&mut socket, json!({})).await.unwrap()["type"], "connection_ack");
        assert_eq!(loggedin_username(&mut socket).await, Value::Null);
        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_bad_connection_init_token_rejects_connection() {
        let app = TestApp::new().await;
        let server = start(&app).await;

        let mut socket = connect(server.addr, None).await.unwrap();
        let mut frames = Vec::new();
        send(&mut socket, json!({ "type": "connection_init", "payload": { "authorization": "Bearer not-a-token" } })).await;
        while let Some(frame) = next_json(&mut socket).await {
            frames.push(frame);
        }
        assert!(
            frames.iter().all(|f| f["type"] != "connection_ack"),
            "connection was acknowledged: {frames:?}"
        );
        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriptions() {
        let app = TestApp::new().await;
        let server = start(&app).await;

        let mut socket = connect(server.addr, None).await.unwrap();
        assert_eq!(init(&mut socket, json!({})).await.unwrap()["type"], "connection_ack");
        send(
            &mut socket,
            json!({
                "id": "1",
                "type": "subscribe",
                "payload": { "query": "subscription { bookAdded { title } }" },
            }),
        )
        .await;
        while app.events.subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        server.shutdown.cancel();

        let stopped = timeout(WAIT, server.handle).await.expect("server did not stop");
        stopped.unwrap().unwrap();
        assert_eq!(next_json(&mut socket).await, None);
        timeout(WAIT, async {
            while app.events.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscription was not dropped");
    }
}
