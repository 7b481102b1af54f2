use std::sync::{Arc, Mutex};

use strand::http::{Method, Request, StatusCode};
use strand::{Context, Handler, Server};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn request(method: Method, path: &str) -> Request {
    Request::new(method, path.parse().unwrap())
}

fn push(log: &Log, label: &'static str) -> impl Handler {
    let log = log.clone();
    move |_cx: Context| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(label);
        }
    }
}

#[tokio::test]
async fn middleware_and_route_handlers_run_in_registration_order() {
    let log = Log::default();

    let app = Server::new()
        .wrap(push(&log, "A"))
        .wrap(push(&log, "B"))
        .get("/", (push(&log, "C"), push(&log, "D")));

    let response = app.serve_one(request(Method::GET, "/")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(*log.lock().unwrap(), ["A", "B", "C", "D"]);
}

#[tokio::test]
async fn middleware_runs_for_every_route() {
    let log = Log::default();

    let app = Server::new()
        .wrap(push(&log, "mw"))
        .get("/", push(&log, "root"))
        .get("/other", push(&log, "other"));

    app.serve_one(request(Method::GET, "/")).await;
    app.serve_one(request(Method::GET, "/other")).await;

    assert_eq!(*log.lock().unwrap(), ["mw", "root", "mw", "other"]);
}

#[tokio::test]
async fn halt_stops_the_rest_of_the_chain() {
    let log = Log::default();

    let halting = {
        let log = log.clone();
        move |cx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("first");
                cx.halt();
            }
        }
    };

    let app = Server::new().get("/", (halting, push(&log, "second"), push(&log, "third")));

    let response = app.serve_one(request(Method::GET, "/")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(*log.lock().unwrap(), ["first"]);
}

#[tokio::test]
async fn halt_in_middleware_skips_route_handlers() {
    let log = Log::default();

    let gate = {
        let log = log.clone();
        move |cx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("gate");
                cx.status(StatusCode::FORBIDDEN);
                cx.halt();
            }
        }
    };

    let app = Server::new().wrap(gate).get("/", push(&log, "handler"));

    let response = app.serve_one(request(Method::GET, "/")).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(*log.lock().unwrap(), ["gate"]);
}

#[tokio::test]
async fn next_resumes_the_caller_after_later_stages_finish() {
    let log = Log::default();

    let around = {
        let log = log.clone();
        move |cx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("before");
                cx.next().await;
                log.lock().unwrap().push("after");
            }
        }
    };

    let app = Server::new().wrap(around).get("/", push(&log, "inner"));

    app.serve_one(request(Method::GET, "/")).await;

    assert_eq!(*log.lock().unwrap(), ["before", "inner", "after"]);
}

#[tokio::test]
async fn handlers_without_next_still_fall_through_in_order() {
    // No stage calls next(); the run loop alone advances the chain.
    let log = Log::default();

    let app = Server::new().get("/", (push(&log, "one"), push(&log, "two")));

    app.serve_one(request(Method::GET, "/")).await;

    assert_eq!(*log.lock().unwrap(), ["one", "two"]);
}

#[tokio::test]
async fn store_values_flow_between_stages() {
    #[derive(Debug)]
    struct User {
        id: u64,
    }

    let seen = Arc::new(Mutex::new((false, None::<u64>, false)));

    let before = {
        let seen = seen.clone();
        move |cx: Context| {
            let seen = seen.clone();
            async move {
                // Nothing has been stored yet.
                seen.lock().unwrap().0 = cx.get::<User>("user").is_none();
            }
        }
    };

    let store = |cx: Context| async move {
        cx.set("user", User { id: 42 });
    };

    let read = {
        let seen = seen.clone();
        move |cx: Context| {
            let seen = seen.clone();
            async move {
                let mut seen = seen.lock().unwrap();
                seen.1 = cx.get::<User>("user").map(|user| user.id);
                // A mismatched type reads as absent, not as an error.
                seen.2 = cx.get::<String>("user").is_none();
            }
        }
    };

    let app = Server::new().wrap(before).wrap(store).get("/", read);

    let response = app.serve_one(request(Method::GET, "/")).await;
    assert_eq!(response.status, StatusCode::OK);

    let seen = seen.lock().unwrap();
    assert!(seen.0, "store must start empty");
    assert_eq!(seen.1, Some(42));
    assert!(seen.2, "mismatched type must read as absent");
}

#[tokio::test]
async fn next_past_the_end_of_the_chain_is_a_noop() {
    let log = Log::default();

    let last = {
        let log = log.clone();
        move |cx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("last");
                cx.next().await;
                cx.next().await;
                log.lock().unwrap().push("done");
            }
        }
    };

    let app = Server::new().get("/", last);

    let response = app.serve_one(request(Method::GET, "/")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(*log.lock().unwrap(), ["last", "done"]);
}
