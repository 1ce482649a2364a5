use vthread_bench::Sequenced;

fn phonetic() -> Sequenced<String> {
    ["Alpha", "Bravo", "Charlie", "Delta"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn reversed_view_and_ends() {
    let list = phonetic();
    let reversed: Vec<&str> = list.reversed().map(String::as_str).collect();
    assert_eq!(reversed, ["Delta", "Charlie", "Bravo", "Alpha"]);
    assert_eq!(list.get_first().unwrap(), "Alpha");
    assert_eq!(list.get_last().unwrap(), "Delta");
    // the view leaves the list itself alone
    assert_eq!(list.first().map(String::as_str), Some("Alpha"));
}

#[test]
fn grows_at_both_ends() {
    let mut list = phonetic();
    list.add_first("Before Alpha".to_string());
    list.add_last("After Delta".to_string());
    assert_eq!(
        list.to_string(),
        "[Before Alpha, Alpha, Bravo, Charlie, Delta, After Delta]"
    );
    assert_eq!(list.remove_last().as_deref(), Some("After Delta"));
    assert_eq!(list.remove_first().as_deref(), Some("Before Alpha"));
    assert_eq!(list, phonetic());
}
