//! Behaviour-driven tests for cached asset fetching.

mod support;

use std::cell::RefCell;
use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use distpack_packager::fetch::{FetchError, FetchRequest, FetchedAsset, fetch};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::StaticSource;
use tempfile::TempDir;

const ASSET_URI: &str = "https://assets.example.test/server-release.jar";

struct FetchWorld {
    dir: TempDir,
    source: RefCell<StaticSource>,
    result: RefCell<Option<Result<FetchedAsset, FetchError>>>,
}

impl FetchWorld {
    fn destination(&self) -> PathBuf {
        self.dir.path().join("cache").join("server")
    }

    fn fetch_with(&self, version_key: &str) -> Result<FetchedAsset, FetchError> {
        let request = FetchRequest::new(ASSET_URI, version_key, self.destination());
        fetch(&*self.source.borrow(), &request)
    }

    fn serve(&self, update: impl FnOnce(StaticSource) -> StaticSource) {
        let current = self.source.take();
        self.source.replace(update(current));
    }
}

#[fixture]
fn fetch_world() -> FetchWorld {
    FetchWorld {
        dir: TempDir::new().unwrap_or_else(|err| panic!("failed to create temp dir: {err}")),
        source: RefCell::new(StaticSource::default()),
        result: RefCell::new(None),
    }
}

#[derive(Debug)]
struct QuotedText(String);

impl FromStr for QuotedText {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input
            .trim()
            .trim_matches(|candidate| matches!(candidate, '"' | '\''));

        Ok(Self(trimmed.to_owned()))
    }
}

#[given("a remote asset answering with status {status}")]
fn failing_asset(fetch_world: &FetchWorld, status: u16) {
    fetch_world.serve(|source| source.with_status(ASSET_URI, status));
}

#[given("a remote asset serving {body}")]
fn serving_asset(fetch_world: &FetchWorld, body: QuotedText) {
    fetch_world.serve(|source| source.with_body(ASSET_URI, body.0.into_bytes()));
}

#[given("the asset was fetched once")]
fn fetched_once(fetch_world: &FetchWorld) {
    fetch_world
        .fetch_with("146")
        .unwrap_or_else(|err| panic!("initial fetch should succeed: {err}"));
}

#[when("the asset is fetched")]
fn fetch_asset(fetch_world: &FetchWorld) {
    let outcome = fetch_world.fetch_with("146");
    fetch_world.result.replace(Some(outcome));
}

#[when("the asset is fetched with version key {key}")]
fn fetch_asset_with_key(fetch_world: &FetchWorld, key: QuotedText) {
    let outcome = fetch_world.fetch_with(&key.0);
    fetch_world.result.replace(Some(outcome));
}

#[then("the fetch fails with status {status}")]
fn fails_with_status(fetch_world: &FetchWorld, status: u16) {
    let borrow = fetch_world.result.borrow();
    match borrow.as_ref() {
        Some(Err(FetchError::RemoteFetch {
            status: received, ..
        })) => assert_eq!(*received, Some(status)),
        Some(Err(other)) => panic!("expected a remote fetch failure but got {other}"),
        Some(Ok(asset)) => panic!("expected the fetch to fail but got {asset:?}"),
        None => panic!("the asset should be fetched"),
    }
}

#[then("the destination directory is absent")]
fn destination_absent(fetch_world: &FetchWorld) {
    assert!(!fetch_world.destination().exists());
}

#[then("the asset contains {body}")]
fn asset_contains(fetch_world: &FetchWorld, body: QuotedText) {
    let borrow = fetch_world.result.borrow();
    let asset = match borrow.as_ref() {
        Some(Ok(asset)) => asset,
        Some(Err(error)) => panic!("expected the fetch to succeed: {error}"),
        None => panic!("the asset should be fetched"),
    };
    let contents = fs::read_to_string(&asset.local_path)
        .unwrap_or_else(|err| panic!("failed to read fetched asset: {err}"));
    assert_eq!(contents, body.0);
    assert_eq!(asset.contents_manifest, vec!["server-release.jar".to_owned()]);
}

#[then("the remote was asked once")]
fn asked_once(fetch_world: &FetchWorld) {
    assert_eq!(fetch_world.source.borrow().requests(), 1);
}

#[then("the remote was asked twice")]
fn asked_twice(fetch_world: &FetchWorld) {
    assert_eq!(fetch_world.source.borrow().requests(), 2);
}

#[scenario("tests/features/fetch.feature", index = 0)]
fn scenario_missing_asset(fetch_world: FetchWorld) {
    let _ = fetch_world;
}

#[scenario("tests/features/fetch.feature", index = 1)]
fn scenario_cache_hit(fetch_world: FetchWorld) {
    let _ = fetch_world;
}

#[scenario("tests/features/fetch.feature", index = 2)]
fn scenario_version_change(fetch_world: FetchWorld) {
    let _ = fetch_world;
}
