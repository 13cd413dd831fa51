use crate::silent_logs;
use quarry::{
    Attributes, CompareOp, Condition, ErrorKind, OrderBy, Schema, error_kind, values,
};

pub async fn paging(schema: &Schema) {
    let entries = schema.result_set("entries").expect("Failed to open entries");
    entries
        .populate((101..=125).map(|n| values! { "n" => n }).collect())
        .await
        .expect("Failed to populate entries");
    let paged = entries.search(
        Condition::compare("n", CompareOp::Greater, 100),
        Attributes::new().order_by([OrderBy::asc("n")]),
    );

    // First page
    let mut first = paged.page(1).search(Condition::Empty, Attributes::new().rows(10));
    let pager = first.pager().expect("Failed to get the pager");
    assert_eq!(pager.entries_per_page(), 10);
    assert_eq!(pager.current_page(), 1);
    assert_eq!(pager.resolved_total(), None);
    silent_logs! {
        let error = pager.last_page().expect_err("The total is not resolved yet");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
    }
    let queries = schema.stats().queries();
    assert_eq!(pager.total_entries().await.unwrap(), 25);
    assert_eq!(pager.total_entries().await.unwrap(), 25);
    assert_eq!(schema.stats().queries(), queries + 1);
    assert_eq!(pager.first_page(), 1);
    assert_eq!(pager.last_page().unwrap(), 3);
    assert_eq!(pager.entries_on_this_page().unwrap(), 10);
    assert_eq!(pager.first_entry().unwrap(), 1);
    assert_eq!(pager.last_entry().unwrap(), 10);
    assert_eq!(pager.previous_page(), None);
    assert_eq!(pager.next_page().unwrap(), Some(2));
    assert_eq!(first.pager().unwrap().resolved_total(), Some(25));
    assert_eq!(first.all().await.unwrap().len(), 10);

    // Last page
    let mut last = paged.page(3);
    assert_eq!(last.attributes().rows, Some(10));
    let pager = last.pager().unwrap();
    pager.total_entries().await.unwrap();
    assert_eq!(pager.current_page(), 3);
    assert_eq!(pager.entries_on_this_page().unwrap(), 5);
    assert_eq!(pager.first_entry().unwrap(), 21);
    assert_eq!(pager.last_entry().unwrap(), 25);
    assert_eq!(pager.previous_page(), Some(2));
    assert_eq!(pager.next_page().unwrap(), None);
    let values: Vec<i64> = last
        .all()
        .await
        .unwrap()
        .iter()
        .map(|r| r.get_as("n").unwrap())
        .collect();
    assert_eq!(values, [121, 122, 123, 124, 125]);

    // Page 0 is page 1, offsets map onto pages
    assert_eq!(paged.page(0).attributes().page, Some(1));
    let mut sliced = paged.slice(20, 29).unwrap();
    assert_eq!(sliced.pager().unwrap().current_page(), 3);

    // Rows and total together
    let (rows, pager) = paged
        .search_with_pager(Condition::Empty, Attributes::new().page(2))
        .await
        .expect("Failed to fetch the second page");
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0].get_as::<i64>("n").unwrap(), 111);
    assert_eq!(pager.resolved_total(), Some(25));
    assert_eq!(pager.current_page(), 2);
    assert_eq!(pager.last_entry().unwrap(), 20);
    let (rows, pager) = paged
        .search_with_pager(
            Condition::compare("n", CompareOp::Greater, 1000),
            Attributes::new().rows(5),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(pager.current_page(), 1);
    assert_eq!(pager.last_page().unwrap(), 1);
    assert_eq!(pager.entries_on_this_page().unwrap(), 0);
    assert_eq!(pager.first_entry().unwrap(), 0);
    assert_eq!(pager.next_page().unwrap(), None);
}
