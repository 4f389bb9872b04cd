//! Integration tests for the engine crate: full edit → save → fresh
//! render → reload → reconcile → apply round trips.

use pagewright_content::{InMemoryRemote, LocalCache, PersistenceGateway};
use pagewright_dom::{NodeId, PageTree};
use pagewright_engine::apply::COUNTER_VALUE_ATTR;
use pagewright_engine::session::ANIMATING_ATTR;
use pagewright_engine::{EditSession, EngineError};
use std::path::Path;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Handles into the demo storefront page.
struct Page {
    tree: PageTree,
    menu_items: Vec<NodeId>,
    hero: NodeId,
    heading: NodeId,
    slide: NodeId,
    slide_image: NodeId,
    counter: NodeId,
    footer_note: NodeId,
}

/// The rendering layer regenerates this structure from scratch on every
/// visit; building it twice simulates two independent page loads.
fn render_page() -> Page {
    let mut tree = PageTree::new("body");

    let nav = tree.create_element("nav");
    let ul = tree.create_element("ul");
    tree.append_child(tree.root(), nav).unwrap();
    tree.append_child(nav, ul).unwrap();
    let mut menu_items = Vec::new();
    for label in ["Home", "Pricing"] {
        let li = tree.create_element("li");
        tree.set_attribute(li, "class", "menu-item").unwrap();
        let t = tree.create_text(label);
        tree.append_child(ul, li).unwrap();
        tree.append_child(li, t).unwrap();
        menu_items.push(li);
    }

    let hero = tree.create_element("section");
    tree.set_attribute(hero, "class", "hero wide").unwrap();
    let heading = tree.create_element("h1");
    let heading_text = tree.create_text("Welcome");
    let intro = tree.create_element("p");
    let intro_text = tree.create_text("Intro copy");
    tree.append_child(tree.root(), hero).unwrap();
    tree.append_child(hero, heading).unwrap();
    tree.append_child(heading, heading_text).unwrap();
    tree.append_child(hero, intro).unwrap();
    tree.append_child(intro, intro_text).unwrap();

    let carousel = tree.create_element("div");
    tree.set_attribute(carousel, "class", "carousel").unwrap();
    let slide = tree.create_element("div");
    tree.set_attribute(slide, "class", "slide").unwrap();
    let slide_image = tree.create_element("img");
    tree.set_attribute(slide_image, "src", "old.jpg").unwrap();
    let slide_title = tree.create_element("h3");
    let slide_title_text = tree.create_text("Old title");
    let slide_desc = tree.create_element("p");
    let slide_desc_text = tree.create_text("Old description");
    tree.append_child(tree.root(), carousel).unwrap();
    tree.append_child(carousel, slide).unwrap();
    tree.append_child(slide, slide_image).unwrap();
    tree.append_child(slide, slide_title).unwrap();
    tree.append_child(slide_title, slide_title_text).unwrap();
    tree.append_child(slide, slide_desc).unwrap();
    tree.append_child(slide_desc, slide_desc_text).unwrap();

    let counter = tree.create_element("span");
    tree.set_attribute(counter, "class", "stat").unwrap();
    let counter_text = tree.create_text("0");
    tree.append_child(tree.root(), counter).unwrap();
    tree.append_child(counter, counter_text).unwrap();

    let footer = tree.create_element("footer");
    let footer_note = tree.create_element("small");
    let footer_text = tree.create_text("© Example");
    tree.append_child(tree.root(), footer).unwrap();
    tree.append_child(footer, footer_note).unwrap();
    tree.append_child(footer_note, footer_text).unwrap();

    Page {
        tree,
        menu_items,
        hero,
        heading,
        slide,
        slide_image,
        counter,
        footer_note,
    }
}

fn local_session(dir: &Path) -> EditSession {
    EditSession::new("home", PersistenceGateway::new(LocalCache::new(dir)))
}

#[test]
fn test_text_edit_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    // First visit: edit and save.
    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session.make_editable(&mut page.tree, page.heading).unwrap();
    session.edit_text(&mut page.tree, page.heading, "World").unwrap();
    assert!(session.save().success);

    // Second visit: structurally identical tree, no keys anywhere.
    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();

    assert_eq!(report.applied, 1);
    assert!(report.pruned.is_empty());
    assert_eq!(fresh.tree.direct_text(fresh.heading), "World");
}

#[test]
fn test_degraded_match_survives_added_siblings() {
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session.make_editable(&mut page.tree, page.heading).unwrap();
    session.edit_text(&mut page.tree, page.heading, "World").unwrap();
    session.save();

    // The next render inserts a banner section before the hero, so the
    // captured positional path now points elsewhere.
    let mut fresh = render_page();
    let promo = fresh.tree.create_element("section");
    fresh.tree.set_attribute(promo, "class", "promo").unwrap();
    fresh.tree.insert_child(fresh.tree.root(), 1, promo).unwrap();

    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(fresh.tree.direct_text(fresh.heading), "World");
}

#[test]
fn test_reordered_menu_items_keep_their_edits() {
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session.make_editable(&mut page.tree, page.menu_items[1]).unwrap();
    session
        .edit_text(&mut page.tree, page.menu_items[1], "Plans")
        .unwrap();
    session.save();

    // Fresh render with the menu items swapped: positional identity now
    // lies, direct-text strictness must decide.
    let mut fresh = render_page();
    let ul = fresh.tree.parent(fresh.menu_items[0]).unwrap();
    fresh.tree.detach(fresh.menu_items[1]);
    fresh.tree.insert_child(ul, 0, fresh.menu_items[1]).unwrap();

    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(fresh.tree.direct_text(fresh.menu_items[1]), "Plans");
    assert_eq!(fresh.tree.direct_text(fresh.menu_items[0]), "Home");
}

#[test]
fn test_composite_and_image_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session.make_editable(&mut page.tree, page.slide).unwrap();
    session
        .edit_composite(
            &mut page.tree,
            page.slide,
            Some("Summer sale".to_string()),
            None,
        )
        .unwrap();
    session
        .edit_image(&mut page.tree, page.slide_image, "beach.jpg", None)
        .unwrap();
    session.save();

    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();

    assert_eq!(report.applied, 2);
    let title = fresh.tree.children(fresh.slide)[1];
    let description = fresh.tree.children(fresh.slide)[2];
    assert_eq!(fresh.tree.direct_text(title), "Summer sale");
    // The missing sub-field left the description untouched.
    assert_eq!(fresh.tree.direct_text(description), "Old description");
    assert_eq!(fresh.tree.attribute(fresh.slide_image, "src"), Some("beach.jpg"));
}

#[test]
fn test_background_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session
        .edit_background(&mut page.tree, page.hero, "sunset.jpg")
        .unwrap();
    session.save();

    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(
        fresh.tree.style(fresh.hero, "background-image"),
        Some("url(sunset.jpg) !important")
    );
    assert_eq!(
        fresh.tree.style(fresh.hero, "background-size"),
        Some("cover !important")
    );
}

#[test]
fn test_counter_round_trip_stays_consistent() {
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session
        .edit_counter(&mut page.tree, page.counter, 42.0, Some("+".to_string()))
        .unwrap();
    // Both views agree immediately after the edit.
    assert_eq!(page.tree.direct_text(page.counter), "42+");
    assert_eq!(page.tree.attribute(page.counter, COUNTER_VALUE_ATTR), Some("42"));
    session.save();

    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    session.reload(&mut fresh.tree).unwrap();

    assert_eq!(fresh.tree.direct_text(fresh.counter), "42+");
    assert_eq!(
        fresh.tree.attribute(fresh.counter, COUNTER_VALUE_ATTR),
        Some("42")
    );
}

#[test]
fn test_counter_reload_deferred_under_animation() {
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    session
        .edit_counter(&mut page.tree, page.counter, 42.0, None)
        .unwrap();
    session.save();

    // On the next visit the host is mid-animation on the counter.
    let mut fresh = render_page();
    fresh
        .tree
        .set_attribute(fresh.counter, ANIMATING_ATTR, "true")
        .unwrap();
    let mut session = local_session(dir.path());
    session.reload(&mut fresh.tree).unwrap();
    assert_eq!(fresh.tree.direct_text(fresh.counter), "0");

    session.finish_animation(&mut fresh.tree, fresh.counter).unwrap();
    assert_eq!(fresh.tree.direct_text(fresh.counter), "42");
}

#[test]
fn test_orphan_is_pruned_from_map() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let mut page = render_page();
    let mut session = local_session(dir.path());
    session.begin_editing();
    let key = session
        .edit_text(&mut page.tree, page.footer_note, "© Example Ltd")
        .unwrap();
    session.save();

    // The next render dropped the footer entirely; nothing similar
    // remains.
    let mut fresh = render_page();
    let footer = fresh.tree.parent(fresh.footer_note).unwrap();
    fresh.tree.detach(footer);

    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();

    assert_eq!(report.pruned, vec![key.clone()]);
    assert!(!session.map().contains_key(&key));
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, EngineError::OrphanUnrecovered(k) if *k == key)));

    // The prune sticks across the next save.
    session.save();
    let mut session = local_session(dir.path());
    let outcome = session.fetch();
    assert!(!outcome.map.contains_key(&key));
}

#[test]
fn test_corrupt_entry_isolated_on_load() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cache = LocalCache::new(dir.path());

    // A collaborator wrote one malformed entry alongside a good one.
    cache.write(
        "home",
        r#"{
            "h1-welcome-17-aaaaaa": {
                "kind": "text",
                "text": "World",
                "locator": { "tag": "h1", "directText": "Welcome" },
                "timestamp": "2026-08-23T10:00:00Z"
            },
            "broken-key": { "kind": "text", "text": 42 }
        }"#,
    )?;

    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree)?;

    assert_eq!(report.applied, 1);
    assert_eq!(fresh.tree.direct_text(fresh.heading), "World");
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.key.as_deref() == Some("broken-key")));
    Ok(())
}

#[test]
fn test_unknown_record_fields_survive_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = LocalCache::new(dir.path());
    cache.write(
        "home",
        r#"{
            "h1-welcome-17-aaaaaa": {
                "kind": "text",
                "text": "World",
                "locator": { "tag": "h1", "directText": "Welcome" },
                "timestamp": "2026-08-23T10:00:00Z",
                "reviewState": "approved"
            }
        }"#,
    )?;

    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    session.reload(&mut fresh.tree)?;
    session.save();

    let persisted = cache.read("home")?.expect("map was saved");
    let value: serde_json::Value = serde_json::from_str(&persisted)?;
    assert_eq!(value["h1-welcome-17-aaaaaa"]["reviewState"], "approved");
    assert_eq!(value["h1-welcome-17-aaaaaa"]["text"], "World");
    Ok(())
}

#[test]
fn test_remote_outage_degrades_to_local_save() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = PersistenceGateway::with_remote(
        LocalCache::new(dir.path()),
        Box::new(InMemoryRemote::failing_push()),
    );
    let mut session = EditSession::new("home", gateway);

    let mut page = render_page();
    session.begin_editing();
    session.edit_text(&mut page.tree, page.heading, "World").unwrap();

    let outcome = session.save();
    assert!(outcome.success);
    assert!(!outcome.synchronized);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("not yet synchronized")));

    // The local copy is still authoritative for the next load.
    let mut fresh = render_page();
    let mut session = local_session(dir.path());
    let report = session.reload(&mut fresh.tree).unwrap();
    assert_eq!(report.applied, 1);
}

#[test]
fn test_repeat_edits_reuse_one_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut page = render_page();
    let mut session = local_session(dir.path());

    session.begin_editing();
    let first = session.edit_text(&mut page.tree, page.heading, "One").unwrap();
    let second = session.edit_text(&mut page.tree, page.heading, "Two").unwrap();

    assert_eq!(first, second);
    assert_eq!(session.map().len(), 1);
    assert_eq!(page.tree.direct_text(page.heading), "Two");
}
