// tests/invalidation_test.rs
// Cached views against catalog writes, through the public API.

use std::sync::Arc;

use menusync::cache::{DiscountStore, InvalidationEngine, MemoryCache, ReadThroughCache};
use menusync::catalog::model::{DishDraft, MenuDraft, Price, SubmenuDraft};
use menusync::catalog::{CatalogReader, CatalogService};
use menusync::db::CatalogStore;

struct Harness {
    backend: Arc<MemoryCache>,
    cache: ReadThroughCache,
    service: CatalogService,
    reader: CatalogReader,
}

fn harness() -> Harness {
    let backend = Arc::new(MemoryCache::new());
    let cache = ReadThroughCache::new(backend.clone());
    let store = CatalogStore::open_in_memory().unwrap();
    let invalidation = InvalidationEngine::new(cache.clone(), store.clone());
    Harness {
        backend: backend.clone(),
        cache: cache.clone(),
        service: CatalogService::new(store.clone(), invalidation),
        reader: CatalogReader::new(store, cache),
    }
}

fn menu(title: &str) -> MenuDraft {
    MenuDraft {
        title: title.to_string(),
        description: String::new(),
    }
}

fn submenu(title: &str) -> SubmenuDraft {
    SubmenuDraft {
        title: title.to_string(),
        description: String::new(),
    }
}

fn dish(title: &str, price: &str) -> DishDraft {
    DishDraft {
        title: title.to_string(),
        description: String::new(),
        price: price.parse::<Price>().unwrap(),
    }
}

/// Builds one menu with two submenus of two dishes each and reads every view.
async fn populated(h: &Harness) -> (String, Vec<String>, Vec<(String, String)>) {
    let m = h.service.create_menu(&menu("Dinner")).await.unwrap();
    let mut submenus = Vec::new();
    let mut dishes = Vec::new();
    for s_title in ["Starters", "Mains"] {
        let s = h
            .service
            .create_submenu(&m.id, &submenu(s_title))
            .await
            .unwrap()
            .unwrap();
        for d_title in ["A", "B"] {
            let d = h
                .service
                .create_dish(&m.id, &s.id, &dish(d_title, "12.00"))
                .await
                .unwrap()
                .unwrap();
            DiscountStore::new(h.cache.clone()).set(&d.id, 5.0).await;
            dishes.push((s.id.clone(), d.id));
        }
        submenus.push(s.id);
    }

    h.reader.menus().await.unwrap();
    h.reader.menus_detail().await.unwrap();
    h.reader.menu(&m.id).await.unwrap();
    h.reader.submenus(&m.id).await.unwrap();
    for s in &submenus {
        h.reader.submenu(&m.id, s).await.unwrap();
        h.reader.dishes(&m.id, s).await.unwrap();
    }
    for (s, d) in &dishes {
        h.reader.dish(&m.id, s, d).await.unwrap();
    }
    (m.id, submenus, dishes)
}

#[tokio::test]
async fn test_menu_delete_clears_every_derived_key() {
    let h = harness();
    let (m, submenus, dishes) = populated(&h).await;
    assert!(h.backend.len() > 10);

    assert!(h.service.delete_menu(&m).await.unwrap());

    let mut derived = vec![
        m.clone(),
        "menus".to_string(),
        "menus_detail".to_string(),
        format!("{}_submenus", m),
    ];
    for s in &submenus {
        derived.push(s.clone());
        derived.push(format!("{}_{}_dishes", m, s));
    }
    for (s, d) in &dishes {
        derived.push(format!("{}_{}_{}", m, s, d));
        derived.push(format!("discount_{}", d));
    }
    for key in &derived {
        assert_eq!(h.cache.get(key).await, None, "{} survived the delete", key);
    }
    assert!(h.backend.is_empty(), "left behind: {:?}", h.backend.keys());
}

#[tokio::test]
async fn test_submenu_delete_leaves_sibling_views() {
    let h = harness();
    let (m, submenus, dishes) = populated(&h).await;
    let (gone, kept) = (&submenus[0], &submenus[1]);

    assert!(h.service.delete_submenu(&m, gone).await.unwrap());

    assert!(!h.backend.contains(gone));
    assert!(!h.backend.contains(&format!("{}_{}_dishes", m, gone)));
    for (s, d) in dishes.iter().filter(|(s, _)| s == gone) {
        assert!(!h.backend.contains(&format!("{}_{}_{}", m, s, d)));
        assert!(!h.backend.contains(&format!("discount_{}", d)));
    }

    assert!(h.backend.contains(kept));
    for (s, d) in dishes.iter().filter(|(s, _)| s == kept) {
        assert!(h.backend.contains(&format!("{}_{}_{}", m, s, d)));
    }

    let detail = h.reader.menu(&m).await.unwrap().unwrap();
    assert_eq!(detail.submenus_count, 1);
    assert_eq!(detail.dishes_count, 2);
}

#[tokio::test]
async fn test_dish_update_is_visible_with_discount() {
    let h = harness();
    let (m, _, dishes) = populated(&h).await;
    let (s, d) = &dishes[0];

    assert_eq!(h.reader.dish(&m, s, d).await.unwrap().unwrap().price, "11.40");

    h.service
        .update_dish(&m, s, d, &dish("A", "20.00"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.reader.dish(&m, s, d).await.unwrap().unwrap().price, "19.00");
    let listed = h.reader.dishes(&m, s).await.unwrap();
    assert_eq!(listed.iter().find(|v| &v.id == d).unwrap().price, "19.00");
}

#[tokio::test]
async fn test_writes_succeed_while_cache_is_down() {
    let h = harness();
    let (m, _, _) = populated(&h).await;
    h.backend.set_unavailable(true);

    let renamed = h.service.update_menu(&m, &menu("Supper")).await.unwrap();
    assert_eq!(renamed.unwrap().title, "Supper");
    assert_eq!(h.reader.menu(&m).await.unwrap().unwrap().title, "Supper");

    let extra = h.service.create_menu(&menu("Brunch")).await.unwrap();
    assert_eq!(h.reader.menus().await.unwrap().len(), 2);
    assert!(h.service.delete_menu(&extra.id).await.unwrap());
}
