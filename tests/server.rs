use std::any::Any;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use strand::http::{header, Method, Request, Response, StatusCode};
use strand::{panic_message, Context, Server};

fn request(method: Method, path: &str) -> Request {
    Request::new(method, path.parse().unwrap())
}

async fn text(response: Response) -> String {
    let bytes = response.body.bytes().await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn each_verb_routes_to_its_handler() {
    for method in [Method::DELETE, Method::GET, Method::HEAD, Method::POST, Method::PUT] {
        let app = Server::new().route(method.clone(), "/echo", |cx: Context| async move {
            cx.text(cx.method().to_string());
        });

        let response = app.serve_one(request(method.clone(), "/echo")).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(text(response).await, method.as_str());
    }
}

#[tokio::test]
async fn handlers_can_test_the_request_method() {
    let checks = Arc::new(Mutex::new((false, true)));

    let app = Server::new().post("/submit", {
        let checks = checks.clone();
        move |cx: Context| {
            let checks = checks.clone();
            async move {
                let mut checks = checks.lock().unwrap();
                checks.0 = cx.is_method(&Method::POST);
                checks.1 = cx.is_method(&Method::GET);
            }
        }
    });

    app.serve_one(request(Method::POST, "/submit")).await;

    let checks = checks.lock().unwrap();
    assert!(checks.0);
    assert!(!checks.1);
}

#[tokio::test]
async fn route_parameters_arrive_in_request_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let app = Server::new().get("/items/:id/", {
        let seen = seen.clone();
        move |cx: Context| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(cx.param("id").unwrap_or("").to_owned());
            }
        }
    });

    for id in ["1", "2", "3"] {
        let response = app.serve_one(request(Method::GET, &format!("/items/{}/", id))).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    assert_eq!(*seen.lock().unwrap(), ["1", "2", "3"]);
}

#[tokio::test]
async fn request_bodies_can_be_collected_once() {
    let app = Server::new().post("/echo", |cx: Context| async move {
        let body = cx.body().await.unwrap();
        assert!(cx.body().await.is_err(), "second read must fail");
        cx.write(body);
    });

    let response = app
        .serve_one(request(Method::POST, "/echo").body("EchoTest"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(text(response).await, "EchoTest");
}

#[tokio::test]
async fn query_strings_decode_into_typed_values() {
    #[derive(Deserialize)]
    struct Search {
        name: String,
        limit: u32,
    }

    let seen = Arc::new(Mutex::new(None));

    let app = Server::new().get("/search", {
        let seen = seen.clone();
        move |cx: Context| {
            let seen = seen.clone();
            async move {
                let search: Search = cx.request().query().unwrap();
                *seen.lock().unwrap() = Some((search.name, search.limit));
            }
        }
    });

    app.serve_one(request(Method::GET, "/search?name=vera&limit=3")).await;

    assert_eq!(
        *seen.lock().unwrap(),
        Some(("vera".to_owned(), 3))
    );
}

#[tokio::test]
async fn unmatched_paths_hit_the_not_found_callback() {
    let app = Server::new().get("/", |cx: Context| async move { cx.text("root") });

    let response = app.serve_one(request(Method::GET, "/missing")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let app = Server::new()
        .get("/", |cx: Context| async move { cx.text("root") })
        .not_found(|req: &Request, response: &mut Response| {
            response.status = StatusCode::NOT_FOUND;
            response.write(format!("{} not found", req.path()));
        });

    let response = app.serve_one(request(Method::GET, "/missing")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(text(response).await, "/missing not found");
}

#[tokio::test]
async fn wrong_verb_hits_the_method_not_allowed_callback() {
    let app = Server::new()
        .get("/", |cx: Context| async move { cx.text("root") })
        .post("/submit", |cx: Context| async move { cx.text("submitted") });

    let response = app.serve_one(request(Method::GET, "/submit")).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.headers.get(header::ALLOW).and_then(|value| value.to_str().ok()),
        Some("POST")
    );

    let response = app.serve_one(request(Method::POST, "/")).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);

    let app = Server::new()
        .get("/", |cx: Context| async move { cx.text("root") })
        .method_not_allowed(|_req: &Request, response: &mut Response| {
            response.status = StatusCode::METHOD_NOT_ALLOWED;
            response.write("try another verb");
        });

    let response = app.serve_one(request(Method::PUT, "/")).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(text(response).await, "try another verb");
}

#[tokio::test]
async fn near_miss_paths_redirect_to_the_registered_slash_form() {
    let app = Server::new().get("/docs/", |cx: Context| async move { cx.text("docs") });

    let response = app.serve_one(request(Method::GET, "/docs")).await;

    assert_eq!(response.status, StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        response.headers.get(header::LOCATION).and_then(|value| value.to_str().ok()),
        Some("/docs/")
    );
}

#[tokio::test]
async fn a_panicking_handler_produces_the_error_response() {
    let after = Arc::new(Mutex::new(false));

    let app = Server::new().get("/boom", (
        |_cx: Context| async move {
            panic!("AAA");
        },
        {
            let after = after.clone();
            move |_cx: Context| {
                let after = after.clone();
                async move {
                    *after.lock().unwrap() = true;
                }
            }
        },
    ));

    let response = app.serve_one(request(Method::GET, "/boom")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!*after.lock().unwrap(), "handlers after a panic must not run");
}

#[tokio::test]
async fn the_error_callback_receives_the_panic_payload() {
    let app = Server::new()
        .get("/boom", |_cx: Context| async move {
            panic!("AAA");
        })
        .on_error(|_req: &Request, response: &mut Response, panic: Box<dyn Any + Send>| {
            response.status = StatusCode::INTERNAL_SERVER_ERROR;
            response.write(format!("Panic: {}", panic_message(&*panic)));
        });

    let response = app.serve_one(request(Method::GET, "/boom")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "Panic: AAA");
}
