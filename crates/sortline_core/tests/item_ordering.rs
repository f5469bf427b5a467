use rusqlite::{params, Connection};
use sortline_core::db::open_db_in_memory;
use sortline_core::{
    ContainerId, ContainerKind, ItemId, ItemRepository, KeySpace, OrderingError, OrderingService,
    Placement, RepoError, SqliteItemRepository,
};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> OrderingService<SqliteItemRepository<'_>> {
    OrderingService::new(
        SqliteItemRepository::try_new(conn).unwrap(),
        KeySpace::default(),
    )
}

fn set_key(conn: &Connection, item: ItemId, key: f64) {
    conn.execute(
        "UPDATE items SET sort_key = ?2 WHERE item_uuid = ?1;",
        params![item.to_string(), key],
    )
    .unwrap();
}

/// Appends one item per key and pins its sort key.
fn seed(
    conn: &Connection,
    service: &OrderingService<SqliteItemRepository<'_>>,
    container: ContainerId,
    keys: &[f64],
) -> Vec<ItemId> {
    keys.iter()
        .map(|key| {
            let item = service.append_item(container, format!("item {key}")).unwrap();
            set_key(conn, item.uuid, *key);
            item.uuid
        })
        .collect()
}

fn keys_of(service: &OrderingService<SqliteItemRepository<'_>>, container: ContainerId) -> Vec<f64> {
    service
        .list_items(container)
        .unwrap()
        .into_iter()
        .map(|item| item.sort_key)
        .collect()
}

fn titles_of(
    service: &OrderingService<SqliteItemRepository<'_>>,
    container: ContainerId,
) -> Vec<String> {
    service
        .list_items(container)
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect()
}

#[test]
fn pasted_lines_become_items_in_input_order() {
    let conn = setup();
    let service = service(&conn);
    let checklist = service
        .create_container(ContainerKind::Checklist, "Launch")
        .unwrap();

    let items = service
        .append_text(checklist.uuid, "  first\n\n second \r\nthird\rfourth ", true)
        .unwrap();

    let titles: Vec<_> = items.iter().map(|item| item.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second", "third", "fourth"]);
    assert!(items.windows(2).all(|w| w[0].sort_key < w[1].sort_key));
    assert_eq!(
        titles_of(&service, checklist.uuid),
        vec!["first", "second", "third", "fourth"]
    );
}

#[test]
fn pasted_text_without_split_is_one_item() {
    let conn = setup();
    let service = service(&conn);
    let checklist = service
        .create_container(ContainerKind::Checklist, "Notes")
        .unwrap();

    let items = service
        .append_text(checklist.uuid, "line one\nline two\n", false)
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "line one\nline two");
}

#[test]
fn blank_titles_are_rejected() {
    let conn = setup();
    let service = service(&conn);
    let checklist = service
        .create_container(ContainerKind::Checklist, "Blank")
        .unwrap();

    assert!(matches!(
        service.append_text(checklist.uuid, " \n\t ", true),
        Err(OrderingError::InvalidTitle)
    ));
    assert!(matches!(
        service.insert_items(checklist.uuid, Vec::new(), Placement::Tail),
        Err(OrderingError::EmptyBatch)
    ));
    assert!(matches!(
        service.create_container(ContainerKind::Card, "   "),
        Err(OrderingError::InvalidTitle)
    ));
}

#[test]
fn append_to_unknown_container_is_rejected() {
    let conn = setup();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    let err = service.append_item(missing, "orphan").unwrap_err();
    assert!(matches!(err, OrderingError::ContainerNotFound(id) if id == missing));
}

#[test]
fn move_across_containers_takes_midpoint_and_leaves_siblings_alone() {
    let conn = setup();
    let service = service(&conn);
    let source = service.create_container(ContainerKind::Card, "A").unwrap();
    let target = service.create_container(ContainerKind::Card, "B").unwrap();
    let source_ids = seed(&conn, &service, source.uuid, &[1.0, 2.0, 3.0]);
    let target_ids = seed(&conn, &service, target.uuid, &[10.0, 20.0]);

    let moved = service
        .move_item(source_ids[1], target.uuid, Placement::After(target_ids[0]))
        .unwrap();

    assert_eq!(moved.container_uuid, target.uuid);
    assert_eq!(moved.sort_key, 15.0);
    assert_eq!(keys_of(&service, source.uuid), vec![1.0, 3.0]);
    assert_eq!(keys_of(&service, target.uuid), vec![10.0, 15.0, 20.0]);
}

#[test]
fn move_defaults_to_destination_tail() {
    let conn = setup();
    let service = service(&conn);
    let source = service.create_container(ContainerKind::Card, "A").unwrap();
    let target = service.create_container(ContainerKind::Card, "B").unwrap();
    let source_ids = seed(&conn, &service, source.uuid, &[1.0]);
    seed(&conn, &service, target.uuid, &[10.0, 20.0]);

    let moved = service
        .move_item(source_ids[0], target.uuid, Placement::Tail)
        .unwrap();

    assert!(moved.sort_key > 20.0);
    assert!(service.list_items(source.uuid).unwrap().is_empty());
}

#[test]
fn failed_move_keeps_item_in_source_with_old_key() {
    let conn = setup();
    let service = service(&conn);
    let source = service.create_container(ContainerKind::Card, "A").unwrap();
    let ids = seed(&conn, &service, source.uuid, &[1.0, 2.0]);
    let missing = Uuid::new_v4();

    let err = service
        .move_item(ids[0], missing, Placement::Head)
        .unwrap_err();
    assert!(matches!(err, OrderingError::ContainerNotFound(id) if id == missing));

    let item = service.get_item(ids[0]).unwrap();
    assert_eq!(item.container_uuid, source.uuid);
    assert_eq!(item.sort_key, 1.0);
}

#[test]
fn reorder_changes_only_the_dragged_item() {
    let conn = setup();
    let service = service(&conn);
    let list = service.create_container(ContainerKind::List, "Todo").unwrap();
    let items = service
        .append_text(list.uuid, "a\nb\nc", true)
        .unwrap();
    let before: Vec<_> = items.iter().map(|item| item.sort_key).collect();

    let moved = service
        .reorder_item(items[2].uuid, Placement::Head)
        .unwrap();

    assert!(moved.sort_key < before[0]);
    assert_eq!(titles_of(&service, list.uuid), vec!["c", "a", "b"]);
    let after = keys_of(&service, list.uuid);
    assert_eq!(&after[1..], &before[..2]);
}

#[test]
fn reorder_relative_to_itself_is_rejected() {
    let conn = setup();
    let service = service(&conn);
    let list = service.create_container(ContainerKind::List, "Todo").unwrap();
    let item = service.append_item(list.uuid, "solo").unwrap();

    let err = service
        .reorder_item(item.uuid, Placement::After(item.uuid))
        .unwrap_err();
    assert!(matches!(err, OrderingError::NeighborNotFound(id) if id == item.uuid));
}

#[test]
fn exhausted_gap_renormalizes_the_container_and_keeps_order() {
    let conn = setup();
    let service = service(&conn);
    let checklist = service
        .create_container(ContainerKind::Checklist, "Crowded")
        .unwrap();
    let ids = seed(&conn, &service, checklist.uuid, &[1.0, 1.0 + f64::EPSILON, 5.0]);

    let inserted = service
        .insert_items(
            checklist.uuid,
            vec!["wedge".to_string()],
            Placement::After(ids[0]),
        )
        .unwrap();

    let items = service.list_items(checklist.uuid).unwrap();
    let order: Vec<_> = items.iter().map(|item| item.uuid).collect();
    assert_eq!(order, vec![ids[0], inserted[0].uuid, ids[1], ids[2]]);

    let renorm_gap = service.key_space().config().renorm_gap;
    let keys: Vec<_> = items.iter().map(|item| item.sort_key).collect();
    assert_eq!(keys[0], renorm_gap);
    assert_eq!(keys[2], 2.0 * renorm_gap);
    assert_eq!(keys[3], 3.0 * renorm_gap);
}

#[test]
fn repeated_inserts_at_one_boundary_never_break_order() {
    let conn = setup();
    let service = service(&conn);
    let checklist = service
        .create_container(ContainerKind::Checklist, "Hot spot")
        .unwrap();
    let first = service.append_item(checklist.uuid, "first").unwrap();
    service.append_item(checklist.uuid, "last").unwrap();

    for n in 0..120 {
        service
            .insert_items(
                checklist.uuid,
                vec![format!("n{n}")],
                Placement::After(first.uuid),
            )
            .unwrap();
    }

    let mut expected = vec!["first".to_string()];
    expected.extend((0..120).rev().map(|n| format!("n{n}")));
    expected.push("last".to_string());
    assert_eq!(titles_of(&service, checklist.uuid), expected);

    let keys = keys_of(&service, checklist.uuid);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn repeated_drags_to_head_keep_a_strict_order() {
    let conn = setup();
    let service = service(&conn);
    let board = service.create_container(ContainerKind::Board, "Main").unwrap();
    service
        .append_text(board.uuid, "one\ntwo\nthree\nfour", true)
        .unwrap();

    for _ in 0..200 {
        let last = service.list_items(board.uuid).unwrap().pop().unwrap();
        service.reorder_item(last.uuid, Placement::Head).unwrap();
    }

    assert_eq!(
        titles_of(&service, board.uuid),
        vec!["one", "two", "three", "four"]
    );
}

#[test]
fn delete_and_rename_leave_sibling_keys_untouched() {
    let conn = setup();
    let service = service(&conn);
    let checklist = service
        .create_container(ContainerKind::Checklist, "Edit")
        .unwrap();
    let items = service
        .append_text(checklist.uuid, "x\ny\nz", true)
        .unwrap();

    service.delete_item(items[1].uuid).unwrap();
    service.rename_item(items[2].uuid, "  zed  ").unwrap();

    let remaining = service.list_items(checklist.uuid).unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].sort_key, items[0].sort_key);
    assert_eq!(remaining[1].sort_key, items[2].sort_key);
    assert_eq!(remaining[1].title, "zed");

    assert!(matches!(
        service.delete_item(items[1].uuid),
        Err(OrderingError::ItemNotFound(id)) if id == items[1].uuid
    ));
    assert!(matches!(
        service.rename_item(items[0].uuid, ""),
        Err(OrderingError::InvalidTitle)
    ));
}

#[test]
fn transaction_error_rolls_back_every_write() {
    let conn = setup();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let container = repo.create_container(ContainerKind::List, "Rollback").unwrap();

    let result = repo.with_transaction(|store| -> Result<(), RepoError> {
        store.insert_item(Uuid::new_v4(), container.uuid, "ghost", 1.0)?;
        Err(RepoError::InvalidData("abort".to_string()))
    });

    assert!(matches!(result, Err(RepoError::InvalidData(_))));
    assert!(repo.list_items(container.uuid).unwrap().is_empty());
}

#[test]
fn equal_keys_list_in_identifier_order() {
    let conn = setup();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let container = repo.create_container(ContainerKind::List, "Ties").unwrap();
    let high = Uuid::from_u128(0xffff_0000_0000_0000_0000_0000_0000_0001);
    let low = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);

    repo.with_transaction(|store| -> Result<(), RepoError> {
        store.insert_item(high, container.uuid, "high", 4.0)?;
        store.insert_item(low, container.uuid, "low", 4.0)?;
        Ok(())
    })
    .unwrap();

    let order: Vec<_> = repo
        .list_items(container.uuid)
        .unwrap()
        .into_iter()
        .map(|item| item.uuid)
        .collect();
    assert_eq!(order, vec![low, high]);
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteItemRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn moving_a_checklist_carries_its_items_to_the_new_card() {
    let conn = setup();
    let service = service(&conn);
    let list = service.create_container(ContainerKind::List, "Doing").unwrap();
    let card_a = service
        .insert_container(list.uuid, ContainerKind::Card, "Card A", Placement::Tail)
        .unwrap();
    let card_b = service
        .insert_container(list.uuid, ContainerKind::Card, "Card B", Placement::Tail)
        .unwrap();
    let checklist = service
        .insert_container(card_a.uuid, ContainerKind::Checklist, "Release", Placement::Tail)
        .unwrap();
    service
        .insert_container(card_b.uuid, ContainerKind::Checklist, "Other", Placement::Tail)
        .unwrap();
    service
        .append_text(checklist.uuid, "build\ntag\npublish", true)
        .unwrap();
    let item_keys = keys_of(&service, checklist.uuid);

    let moved = service
        .move_item(checklist.uuid, card_b.uuid, Placement::Tail)
        .unwrap();

    assert_eq!(moved.container_uuid, card_b.uuid);
    assert!(service.list_items(card_a.uuid).unwrap().is_empty());
    assert_eq!(titles_of(&service, card_b.uuid), vec!["Other", "Release"]);
    assert_eq!(
        titles_of(&service, checklist.uuid),
        vec!["build", "tag", "publish"]
    );
    assert_eq!(keys_of(&service, checklist.uuid), item_keys);

    let reloaded = service.get_container(checklist.uuid).unwrap();
    assert!(reloaded.is_nested());
    assert_eq!(reloaded.owner_item_uuid, Some(checklist.uuid));
    assert_eq!(reloaded.kind, ContainerKind::Checklist);
}

#[test]
fn nested_containers_sort_among_their_parent_items() {
    let conn = setup();
    let service = service(&conn);
    let card = service.create_container(ContainerKind::Card, "Card").unwrap();
    let first = service
        .insert_container(card.uuid, ContainerKind::Checklist, "First", Placement::Tail)
        .unwrap();
    service
        .insert_container(card.uuid, ContainerKind::Checklist, "Second", Placement::Tail)
        .unwrap();
    service
        .insert_container(
            card.uuid,
            ContainerKind::Checklist,
            "Between",
            Placement::After(first.uuid),
        )
        .unwrap();

    assert_eq!(titles_of(&service, card.uuid), vec!["First", "Between", "Second"]);
}

#[test]
fn item_cannot_move_into_its_own_subtree() {
    let conn = setup();
    let service = service(&conn);
    let list = service.create_container(ContainerKind::List, "List").unwrap();
    let card = service
        .insert_container(list.uuid, ContainerKind::Card, "Card", Placement::Tail)
        .unwrap();
    let checklist = service
        .insert_container(card.uuid, ContainerKind::Checklist, "Steps", Placement::Tail)
        .unwrap();
    let before = service.get_item(card.uuid).unwrap();

    for target in [card.uuid, checklist.uuid] {
        let err = service
            .move_item(card.uuid, target, Placement::Tail)
            .unwrap_err();
        assert!(matches!(
            err,
            OrderingError::CyclicMove { item, target: rejected }
                if item == card.uuid && rejected == target
        ));
    }

    let after = service.get_item(card.uuid).unwrap();
    assert_eq!(after.container_uuid, list.uuid);
    assert_eq!(after.sort_key, before.sort_key);
}

#[test]
fn deleting_a_nested_container_removes_its_owner_and_items() {
    let conn = setup();
    let service = service(&conn);
    let card = service.create_container(ContainerKind::Card, "Card").unwrap();
    let keep = service
        .insert_container(card.uuid, ContainerKind::Checklist, "Keep", Placement::Tail)
        .unwrap();
    let stale = service
        .insert_container(card.uuid, ContainerKind::Checklist, "Drop", Placement::Tail)
        .unwrap();
    service.append_text(stale.uuid, "a\nb", true).unwrap();
    let keep_key = service.get_item(keep.uuid).unwrap().sort_key;

    service.delete_container(stale.uuid).unwrap();

    assert_eq!(titles_of(&service, card.uuid), vec!["Keep"]);
    assert_eq!(service.get_item(keep.uuid).unwrap().sort_key, keep_key);
    assert!(matches!(
        service.get_container(stale.uuid),
        Err(OrderingError::ContainerNotFound(id)) if id == stale.uuid
    ));
    // `card` and `keep` remain; `keep`'s owning item is the only item left.
    assert_eq!(count_rows(&conn, "containers"), 2);
    assert_eq!(count_rows(&conn, "items"), 1);
}

#[test]
fn deleting_a_top_level_container_cascades_through_every_level() {
    let conn = setup();
    let service = service(&conn);
    let list = service.create_container(ContainerKind::List, "List").unwrap();
    let card = service
        .insert_container(list.uuid, ContainerKind::Card, "Card", Placement::Tail)
        .unwrap();
    let checklist = service
        .insert_container(card.uuid, ContainerKind::Checklist, "Steps", Placement::Tail)
        .unwrap();
    service.append_text(checklist.uuid, "one\ntwo", true).unwrap();

    service.delete_container(list.uuid).unwrap();

    assert_eq!(count_rows(&conn, "containers"), 0);
    assert_eq!(count_rows(&conn, "items"), 0);
    assert!(matches!(
        service.delete_container(list.uuid),
        Err(OrderingError::ContainerNotFound(_))
    ));
}

#[test]
fn deleting_the_owning_item_drops_its_container() {
    let conn = setup();
    let service = service(&conn);
    let card = service.create_container(ContainerKind::Card, "Card").unwrap();
    let checklist = service
        .insert_container(card.uuid, ContainerKind::Checklist, "Steps", Placement::Tail)
        .unwrap();
    service.append_text(checklist.uuid, "one\ntwo", true).unwrap();

    service.delete_item(checklist.uuid).unwrap();

    assert!(service.get_container(checklist.uuid).is_err());
    assert_eq!(count_rows(&conn, "items"), 0);
    assert_eq!(count_rows(&conn, "containers"), 1);
}

#[test]
fn renaming_the_owning_item_renames_its_container() {
    let conn = setup();
    let service = service(&conn);
    let card = service.create_container(ContainerKind::Card, "Card").unwrap();
    let checklist = service
        .insert_container(card.uuid, ContainerKind::Checklist, "Draft", Placement::Tail)
        .unwrap();

    service.rename_item(checklist.uuid, "  Final ").unwrap();

    assert_eq!(service.get_item(checklist.uuid).unwrap().title, "Final");
    assert_eq!(service.get_container(checklist.uuid).unwrap().title, "Final");
}
