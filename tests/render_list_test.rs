use std::rc::Rc;

use flow_residency::{
    data_structures::{
        properties::Properties,
        scene::{GeometryGroup, Material},
    },
    render::{RenderList, RenderLists},
};

use crate::common::test_utils::{assign_program, geometry, material, object};

mod common;

fn zs<'a>(items: impl Iterator<Item = &'a flow_residency::RenderItem>) -> Vec<f32> {
    items.map(|item| item.z).collect()
}

#[test]
fn should_sort_opaque_items_by_ascending_depth() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(false);
    let a = object(0);
    let b = object(0);

    list.init();
    list.push(&a, &geometry, &material, 0, 5.0, None);
    list.push(&b, &geometry, &material, 0, 2.0, None);
    list.sort();

    let ids: Vec<_> = list.opaque().map(|item| item.id).collect();
    assert_eq!(ids, vec![Some(b.id()), Some(a.id())]);
    assert_eq!(zs(list.opaque()), vec![2.0, 5.0]);
}

#[test]
fn should_break_ties_by_object_id() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(false);
    let first = object(0);
    let second = object(0);
    let third = object(0);

    list.init();
    list.push(&third, &geometry, &material, 0, 1.0, None);
    list.push(&first, &geometry, &material, 0, 1.0, None);
    list.push(&second, &geometry, &material, 0, 1.0, None);
    list.sort();
    let once: Vec<_> = list.opaque().map(|item| item.id).collect();
    list.sort();
    let twice: Vec<_> = list.opaque().map(|item| item.id).collect();

    let expected = vec![Some(first.id()), Some(second.id()), Some(third.id())];
    assert_eq!(once, expected);
    assert_eq!(twice, expected);
}

#[test]
fn should_apply_group_and_render_order_before_depth() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(false);
    let late = object(1);
    let early = object(-1);
    let grouped = object(-5);

    list.init();
    list.push(&grouped, &geometry, &material, 1, 0.0, None);
    list.push(&late, &geometry, &material, 0, 0.0, None);
    list.push(&early, &geometry, &material, 0, 9.0, None);
    list.sort();

    let ids: Vec<_> = list.opaque().map(|item| item.id).collect();
    assert_eq!(ids, vec![Some(early.id()), Some(late.id()), Some(grouped.id())]);
}

#[test]
fn should_only_compare_programs_when_both_items_have_one() {
    let properties = Properties::shared();
    let geometry = geometry();
    let lower = material(false);
    let higher = material(false);
    let a = object(0);
    let b = object(0);

    // program ids run against material ids
    let old_program = assign_program(&properties, &higher, "old");
    assign_program(&properties, &lower, "new");

    let mut list = RenderList::new(properties.clone());
    list.init();
    list.push(&a, &geometry, &lower, 0, 0.0, None);
    list.push(&b, &geometry, &higher, 0, 0.0, None);
    list.sort();

    let ids: Vec<_> = list.opaque().map(|item| item.id).collect();
    assert_eq!(ids, vec![Some(b.id()), Some(a.id())]);
    assert!(
        list.opaque()
            .next()
            .and_then(|item| item.program.as_ref())
            .is_some_and(|program| Rc::ptr_eq(program, &old_program))
    );

    properties
        .borrow_mut()
        .materials
        .get(higher.uuid())
        .program = None;

    let mut list = RenderList::new(properties.clone());
    list.init();
    list.push(&b, &geometry, &higher, 0, 0.0, None);
    list.push(&a, &geometry, &lower, 0, 0.0, None);
    list.sort();

    // one side without a program: material id decides
    let ids: Vec<_> = list.opaque().map(|item| item.id).collect();
    assert_eq!(ids, vec![Some(a.id()), Some(b.id())]);
}

#[test]
fn should_partition_items_by_transparency() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let opaque = material(false);
    let transparent = material(true);

    list.init();
    for i in 0..7 {
        let material = if i % 3 == 0 { &transparent } else { &opaque };
        list.push(&object(0), &geometry, material, 0, i as f32, None);
    }

    assert!(list.opaque().all(|item| item.material.as_ref().is_some_and(|m| !m.transparent)));
    assert!(list.transparent().all(|item| item.material.as_ref().is_some_and(|m| m.transparent)));
    assert_eq!(list.opaque().len(), 4);
    assert_eq!(list.transparent().len(), 3);
    assert_eq!(list.opaque().len() + list.transparent().len(), list.live_len());
}

#[test]
fn should_sort_transparent_items_like_opaque_ones() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(true);

    list.init();
    for z in [3.0, 1.0, 2.0] {
        list.push(&object(0), &geometry, &material, 0, z, None);
    }
    list.sort();

    assert_eq!(zs(list.transparent()), vec![1.0, 2.0, 3.0]);
    assert_eq!(list.opaque().len(), 0);
}

#[test]
fn should_prepend_on_unshift() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(false);
    let a = object(0);
    let b = object(0);

    list.init();
    list.push(&a, &geometry, &material, 0, 0.0, None);
    list.unshift(&b, &geometry, &material, 0, 0.0, None);

    let ids: Vec<_> = list.opaque().map(|item| item.id).collect();
    assert_eq!(ids, vec![Some(b.id()), Some(a.id())]);
}

#[test]
fn should_keep_pool_size_across_frames() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(false);

    list.init();
    for _ in 0..3 {
        list.push(&object(0), &geometry, &material, 0, 0.0, None);
    }
    assert_eq!(list.render_items().len(), 3);

    list.init();
    for _ in 0..2 {
        list.push(&object(0), &geometry, &material, 0, 0.0, None);
    }
    assert_eq!(list.render_items().len(), 3);
    assert_eq!(list.live_len(), 2);

    list.init();
    for _ in 0..5 {
        list.push(&object(0), &geometry, &material, 0, 0.0, None);
    }
    assert_eq!(list.render_items().len(), 5);
}

#[test]
fn should_release_unused_slots_on_finish() {
    let mut list = RenderList::new(Properties::shared());
    let geometry = geometry();
    let material = material(false);
    let kept = object(0);
    let dropped = object(0);

    list.init();
    list.push(&kept, &geometry, &material, 0, 0.0, None);
    list.push(&dropped, &geometry, &material, 0, 0.0, Some(GeometryGroup::default()));
    list.push(&object(0), &geometry, &material, 0, 0.0, None);
    list.finish();

    list.init();
    list.push(&kept, &geometry, &material, 0, 0.0, None);
    list.finish();

    let items = list.render_items();
    assert_eq!(items.len(), 3);
    assert!(items[0].is_active());
    assert!(items[1..].iter().all(|item| {
        !item.is_active()
            && item.object.is_none()
            && item.geometry.is_none()
            && item.material.is_none()
            && item.program.is_none()
            && item.group.is_none()
    }));
    // the pool no longer holds `dropped`
    assert_eq!(Rc::strong_count(&dropped), 1);

    let before: Vec<_> = items.iter().map(|item| (item.id, item.z)).collect();
    list.finish();
    let after: Vec<_> = list.render_items().iter().map(|item| (item.id, item.z)).collect();
    assert_eq!(before, after);
}

#[test]
fn should_keep_stale_program_on_reused_slot() {
    let properties = Properties::shared();
    let mut list = RenderList::new(properties.clone());
    let geometry = geometry();
    let material = material(false);
    let program = assign_program(&properties, &material, "stale");

    list.init();
    list.push(&object(0), &geometry, &material, 0, 0.0, None);

    properties
        .borrow_mut()
        .materials
        .get(material.uuid())
        .program = None;

    list.init();
    list.push(&object(0), &geometry, &material, 0, 0.0, None);
    list.push(&object(0), &geometry, &material, 0, 0.0, None);

    let programs: Vec<_> = list.opaque().map(|item| item.program.clone()).collect();
    assert!(programs[0].as_ref().is_some_and(|p| Rc::ptr_eq(p, &program)));
    assert!(programs[1].is_none());
}

#[test]
fn should_hand_out_one_list_per_scene_and_depth() {
    let mut lists = RenderLists::new(Properties::shared());
    let geometry = geometry();
    let material: Rc<Material> = material(false);

    let outer = lists.get(1, 0);
    outer.init();
    outer.push(&object(0), &geometry, &material, 0, 0.0, None);

    let inner = lists.get(1, 1);
    inner.init();
    assert_eq!(inner.live_len(), 0);

    assert_eq!(lists.get(1, 0).live_len(), 1);
    assert_eq!(lists.get(2, 0).live_len(), 0);

    lists.dispose();
    assert!(lists.get(1, 0).render_items().is_empty());
}
