use std::collections::HashSet;

use polars::prelude::*;
use rstest::{fixture, rstest};
use tabframe::selectors;
use tabframe::{ColumnScope, ConcatHow, ErrorCode, JoinHow, TableFrame, required_columns};

#[fixture]
fn logging() {
    logutil::init_test();
}

fn base() -> TableFrame {
    let df = df!(
        "id" => [1, 2, 3, 4],
        "group" => ["a", "b", "a", "b"],
        "value" => [10.0, 20.0, 30.0, 40.0],
    )
    .unwrap();
    TableFrame::from_polars(df).unwrap()
}

fn other() -> TableFrame {
    let df = df!("id" => [2, 3, 5], "label" => ["two", "three", "five"]).unwrap();
    TableFrame::from_polars(df).unwrap()
}

fn with_system(user: &[&str]) -> Vec<String> {
    user.iter()
        .chain(required_columns())
        .map(|n| n.to_string())
        .collect()
}

#[rstest]
#[case::select(base().select([col("value"), col("id")]).unwrap(), &["value", "id"])]
#[case::filter(base().filter(col("value").gt(lit(15.0))).unwrap(), &["id", "group", "value"])]
#[case::join(
    base().join(&other(), &["id"], JoinHow::Inner).unwrap(),
    &["id", "group", "value", "label"]
)]
#[case::group_by(
    base().group_by([col("group")]).agg([col("value").mean()]).unwrap(),
    &["group", "value"]
)]
#[case::concat(base().concat(&[base()], ConcatHow::Vertical).unwrap(), &["id", "group", "value"])]
#[case::rename(base().rename([("group", "g")]).unwrap(), &["id", "g", "value"])]
#[case::drop(base().drop("group").unwrap(), &["id", "value"])]
#[case::sort(
    base().sort(vec![col("value")], SortMultipleOptions::default()).unwrap(),
    &["id", "group", "value"]
)]
#[case::unique(
    base().unique(None, UniqueKeepStrategy::First).unwrap(),
    &["id", "group", "value"]
)]
#[case::limit(base().limit(2).unwrap(), &["id", "group", "value"])]
#[case::slice(base().slice(1, 2).unwrap(), &["id", "group", "value"])]
#[case::with_columns(
    base().with_columns([lit(true).alias("flag")]).unwrap(),
    &["id", "group", "value", "flag"]
)]
fn system_columns_follow_user_columns(
    #[from(logging)] _log: (),
    #[case] frame: TableFrame,
    #[case] user: &[&str],
) {
    assert_eq!(with_system(user), frame.columns(ColumnScope::All).unwrap());

    let df = frame.collect_all().unwrap();
    let ids = df.column("$td.id").unwrap().str().unwrap();
    assert_eq!(0, ids.null_count());
    let unique: HashSet<_> = ids.into_iter().collect();
    assert_eq!(df.height(), unique.len());
}

#[rstest]
fn build_from_dict(#[from(logging)] _log: ()) {
    let mut dict = indexmap::IndexMap::new();
    dict.insert(
        "a".to_string(),
        vec![AnyValue::Int64(1), AnyValue::Int64(2), AnyValue::Int64(3)],
    );
    let tf = TableFrame::from_dict(dict).unwrap();

    assert_eq!(1 + required_columns().len(), tf.width().unwrap());
    assert_eq!(with_system(&["a"]), tf.columns(ColumnScope::All).unwrap());
}

#[rstest]
fn wrap_unwrap_round_trip(#[from(logging)] _log: ()) {
    let tf = base();
    let wrapped = TableFrame::wrap(tf.unwrap()).unwrap();

    assert_eq!(
        tf.columns(ColumnScope::All).unwrap(),
        wrapped.columns(ColumnScope::All).unwrap()
    );
    assert!(
        tf.collect_all()
            .unwrap()
            .equals_missing(&wrapped.collect_all().unwrap())
    );
}

#[rstest]
fn reassembly_is_idempotent(#[from(logging)] _log: ()) {
    let tf = base();
    let once = tf.collect_all().unwrap();

    let rebuilt = TableFrame::wrap(once.clone()).unwrap();
    let twice = rebuilt
        .filter(lit(true))
        .unwrap()
        .collect_all()
        .unwrap();

    assert!(once.equals_missing(&twice));
}

#[rstest]
#[case::positive(vec![2], "c")]
#[case::negative(vec![-1], "c")]
#[case::first(vec![-3], "a")]
fn by_index_selects_user_columns(
    #[from(logging)] _log: (),
    #[case] indices: Vec<i64>,
    #[case] expected: &str,
) {
    let df = df!("a" => [1], "b" => [2], "c" => [3]).unwrap();
    let tf = TableFrame::from_polars(df).unwrap();

    let selected = tf.select_by(&selectors::by_index(indices)).unwrap();
    assert_eq!(vec![expected], selected.columns(ColumnScope::User).unwrap());
}

#[rstest]
#[case::rename_to_reserved("group", "$td.id", "TF-202")]
#[case::rename_system("$td.src", "src", "TF-201")]
#[case::rename_missing("nope", "x", "TF-501")]
fn rename_error_codes(
    #[from(logging)] _log: (),
    #[case] from: &str,
    #[case] to: &str,
    #[case] code: &str,
) {
    let err = base().rename([(from, to)]).unwrap_err();
    assert_eq!(code, err.code().as_str());
}

#[rstest]
fn rename_to_reserved_has_code(#[from(logging)] _log: ()) {
    let err = base().rename([("id", "$td.id")]).unwrap_err();
    assert_eq!(ErrorCode::RenameToReserved, err.code());
}

#[rstest]
fn selectors_hide_system_columns(#[from(logging)] _log: ()) {
    let tf = base();
    let names = tf.resolve(&selectors::all()).unwrap();
    assert_eq!(
        vec!["id", "group", "value"],
        names.iter().map(|n| n.as_str()).collect::<Vec<_>>()
    );

    let names = tf.resolve(&selectors::string()).unwrap();
    assert_eq!(
        vec!["group"],
        names.iter().map(|n| n.as_str()).collect::<Vec<_>>()
    );
}
