mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, MockServer};
use roster_core::coordinator::{PageStatus, PageView};
use roster_core::models::Page;
use roster_core::{QueryError, QueryKey};

fn page(n: u32) -> Page {
    Page::new(n).expect("page")
}

#[tokio::test]
async fn test_same_page_twice_within_window_is_one_call() {
    let server = MockServer::start(25).await;
    let (list, _, _) = server.coordinators();

    let first = list.fetch_page(Page::FIRST).await.expect("first");
    let second = list.fetch_page(Page::FIRST).await.expect("second");
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.data, second.data);
    assert_eq!(server.state.list_hits(), 1);
}

#[tokio::test]
async fn test_pages_are_cached_independently() {
    let server = MockServer::start(25).await;
    let (list, _, _) = server.coordinators();

    let one = list.fetch_page(page(1)).await.expect("page 1");
    let two = list.fetch_page(page(2)).await.expect("page 2");
    list.fetch_page(page(1)).await.expect("page 1 again");

    assert_eq!(one.data.students[0].id, 1);
    assert_eq!(two.data.students[0].id, 11);
    assert_eq!(server.state.list_hits(), 2);
}

#[tokio::test]
async fn test_total_pages_from_header() {
    let server = MockServer::start(25).await;
    let (list, _, _) = server.coordinators();

    let result = list.fetch_page(Page::FIRST).await.expect("fetch");
    assert_eq!(result.data.total_pages(list.page_size()), 3);

    server.state.omit_total_header(true);
    let result = list.refetch_page(Page::FIRST).await.expect("refetch");
    assert_eq!(result.data.total_pages(list.page_size()), 0);
}

#[tokio::test]
async fn test_concurrent_page_fetches_share_one_request() {
    let server = MockServer::start(25).await;
    server.state.set_list_delay(Duration::from_millis(100));
    let (list, _, _) = server.coordinators();

    let (a, b) = tokio::join!(list.fetch_page(page(2)), list.fetch_page(page(2)));
    assert!(Arc::ptr_eq(&a.expect("a").data, &b.expect("b").data));
    assert_eq!(server.state.list_hits(), 1);
}

#[tokio::test]
async fn test_prefetched_record_is_reused_by_the_form() {
    let server = MockServer::start(5).await;
    let (list, form, queries) = server.coordinators();

    assert!(list.prefetch_student(4));
    // Hovering again while in flight does not issue another request
    assert!(!list.prefetch_student(4));
    wait_until(|| !queries.is_fetching(&QueryKey::student("4"))).await;

    let record = form.fetch_record("4").await.expect("record");
    assert!(record.from_cache);
    assert_eq!(record.data.email, "student4@example.com");
    assert_eq!(server.state.get_hits(), 1);
}

#[tokio::test]
async fn test_form_attaches_to_unfinished_prefetch() {
    let server = MockServer::start(5).await;
    server.state.set_get_delay(Duration::from_millis(100));
    let (list, form, _) = server.coordinators();

    assert!(list.prefetch_student(2));
    let record = form.fetch_record("2").await.expect("record");
    assert_eq!(record.data.id, 2);
    assert_eq!(server.state.get_hits(), 1);
}

#[tokio::test]
async fn test_delete_invalidates_and_refetches_the_page_once() {
    let server = MockServer::start(25).await;
    let (list, _, _) = server.coordinators();

    let before = list.fetch_page(page(2)).await.expect("page 2");
    assert!(before.data.students.iter().any(|s| s.id == 12));
    assert_eq!(server.state.list_hits(), 1);

    let deleted = list.delete_student(12, page(2)).await.expect("delete");
    assert_eq!(deleted.notice(), "Deleted student with id 12");
    assert_eq!(server.state.delete_hits.load(Ordering::SeqCst), 1);
    assert_eq!(server.state.list_hits(), 2);

    let refetched = deleted.refetched.expect("refetched page");
    assert!(!refetched.from_cache);
    assert!(refetched.data.students.iter().all(|s| s.id != 12));
    assert_eq!(refetched.data.total_count, 24);

    // The refetched page is fresh again
    list.fetch_page(page(2)).await.expect("cached");
    assert_eq!(server.state.list_hits(), 2);
}

#[tokio::test]
async fn test_failed_delete_leaves_cache_alone() {
    let server = MockServer::start(3).await;
    let (list, _, _) = server.coordinators();

    list.fetch_page(Page::FIRST).await.expect("page 1");
    assert!(list.delete_student(99, Page::FIRST).await.is_err());
    assert_eq!(server.state.list_hits(), 1);
    assert!(list.fetch_page(Page::FIRST).await.expect("cached").from_cache);
}

#[tokio::test]
async fn test_cancel_without_settled_data_leaves_page_empty() {
    let server = MockServer::start(25).await;
    server.state.set_list_delay(Duration::from_secs(10));
    let (list, _, _) = server.coordinators();

    let fetch = {
        let list = list.clone();
        tokio::spawn(async move { list.fetch_page(page(2)).await })
    };
    wait_until(|| server.state.list_hits() == 1).await;
    assert!(list.cancel_page(page(2)));

    let started = std::time::Instant::now();
    let result = fetch.await.expect("join");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.as_ref().err(), Some(&QueryError::Cancelled));
    assert!(list.cached_page(page(2)).is_none());
    assert_eq!(server.state.list_completed.load(Ordering::SeqCst), 0);

    let mut view = PageView::new(page(2));
    view.apply(page(2), result, list.cached_page(page(2)));
    assert!(view.students().is_empty());
    assert_eq!(view.status(), &PageStatus::Ready);
}

#[tokio::test]
async fn test_cancel_keeps_previously_settled_page() {
    let server = MockServer::start(25).await;
    let (list, _, _) = server.coordinators();

    let settled = list.fetch_page(Page::FIRST).await.expect("settled");
    server.state.set_list_delay(Duration::from_secs(10));

    let refetch = {
        let list = list.clone();
        tokio::spawn(async move { list.refetch_page(Page::FIRST).await })
    };
    wait_until(|| server.state.list_hits() == 2).await;
    assert!(list.is_fetching(Page::FIRST));
    assert!(list.cancel_page(Page::FIRST));
    assert!(!list.cancel_page(Page::FIRST));

    let result = refetch.await.expect("join");
    assert_eq!(result.as_ref().err(), Some(&QueryError::Cancelled));
    let cached = list.cached_page(Page::FIRST).expect("settled data kept");
    assert!(Arc::ptr_eq(&cached, &settled.data));

    let mut view = PageView::new(Page::FIRST);
    view.apply(Page::FIRST, Ok(settled), None);
    view.begin_refresh();
    view.apply(Page::FIRST, result, list.cached_page(Page::FIRST));
    assert_eq!(view.students().len(), 10);
}
