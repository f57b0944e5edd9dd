use kestrel_scenario::effectors::{EffectorCatalog, CONTROL_TRIGGER, WAIT_FOR_DISTANCE, WAIT_TIME};
use kestrel_scenario::panel::{PanelPrefabs, PasteOutcome, TriggerEditPanel};
use kestrel_scenario::pool::{PanelPool, PrefabPool};
use kestrel_scenario::registry::EffectorRegistry;
use kestrel_scenario::trigger::{AgentKind, EffectorId, Trigger, TriggerId};
use std::cell::RefCell;
use std::rc::Rc;

fn visible_ids(panel: &TriggerEditPanel) -> Vec<EffectorId> {
    panel.visible_panels().into_iter().map(|(id, _)| id).collect()
}

fn attached_ids(trigger: &Trigger) -> Vec<EffectorId> {
    let mut ids: Vec<_> = trigger.effectors().iter().map(|instance| instance.id()).collect();
    ids.sort();
    ids
}

#[test]
fn panels_follow_attach_and_detach() {
    let mut registry = EffectorRegistry::new(EffectorCatalog::builtin());
    let mut panel = TriggerEditPanel::new(&mut registry, PrefabPool::new(), PanelPrefabs::default(), |_: &str| true);
    let mut trigger = Trigger::new(TriggerId::new(1), AgentKind::Ego);
    panel.select(&registry, &trigger);
    assert_eq!(panel.dropdown_options(), vec!["Wait Time", "Wait For Distance", "Control Trigger"]);

    let wait = panel.add_selected(&mut registry, &mut trigger, 0).expect("add wait time");
    assert_eq!(panel.dropdown_options(), vec!["Wait For Distance", "Control Trigger"]);
    let control = panel.add_selected(&mut registry, &mut trigger, 1).expect("add control trigger");
    let second_control = panel.add_selected(&mut registry, &mut trigger, 1).expect("add another control trigger");
    assert_eq!(second_control.type_key(), CONTROL_TRIGGER);
    assert_eq!(visible_ids(&panel), attached_ids(&trigger));

    panel.remove(&mut registry, &mut trigger, wait.id()).expect("remove wait time");
    panel.remove(&mut registry, &mut trigger, control.id()).expect("remove control trigger");
    assert_eq!(visible_ids(&panel), attached_ids(&trigger));
    assert_eq!(panel.dropdown_options(), vec!["Wait Time", "Wait For Distance", "Control Trigger"]);
    assert_eq!(panel.available(), registry.snapshot(&trigger));

    let stats = panel.with_pool(PrefabPool::stats);
    assert_eq!(stats.live, 1);
    assert_eq!(stats.idle, 2);
}

#[test]
fn dropdown_tracks_registry_edits_made_elsewhere() {
    let mut registry = EffectorRegistry::new(EffectorCatalog::builtin());
    let mut panel = TriggerEditPanel::new(&mut registry, PrefabPool::new(), PanelPrefabs::default(), |_: &str| true);
    let mut trigger = Trigger::new(TriggerId::new(1), AgentKind::Npc);
    panel.select(&registry, &trigger);

    let wait = registry.attach_key(&mut trigger, WAIT_TIME).expect("attach outside the panel");
    assert_eq!(panel.dropdown_options(), vec!["Wait For Distance", "Time To Collision", "Control Trigger"]);
    assert_eq!(panel.available(), registry.snapshot(&trigger));
    let distance = panel.add_selected(&mut registry, &mut trigger, 0).expect("index 0 is still valid");
    assert_eq!(distance.type_key(), WAIT_FOR_DISTANCE);

    registry.detach(&mut trigger, wait.id()).expect("detach outside the panel");
    assert_eq!(panel.available(), registry.snapshot(&trigger));
    assert_eq!(panel.dropdown_options()[0], "Wait Time");

    let mut source = Trigger::new(TriggerId::new(2), AgentKind::Npc);
    registry.attach_key(&mut source, WAIT_TIME).unwrap();
    let copied = registry.copy_all(&source);
    registry.paste_all(&mut trigger, &copied).expect("paste outside the panel");
    assert_eq!(panel.available(), registry.snapshot(&trigger));
    assert_eq!(visible_ids(&panel), attached_ids(&trigger));
    assert!(panel.add_selected(&mut registry, &mut trigger, 0).is_ok());
}

#[test]
fn edits_to_other_triggers_do_not_touch_visible_panels() {
    let mut registry = EffectorRegistry::new(EffectorCatalog::builtin());
    let mut panel = TriggerEditPanel::new(&mut registry, PrefabPool::new(), PanelPrefabs::default(), |_: &str| true);
    let selected = Trigger::new(TriggerId::new(1), AgentKind::Npc);
    let mut other = Trigger::new(TriggerId::new(2), AgentKind::Npc);
    panel.select(&registry, &selected);

    registry.attach_key(&mut other, WAIT_TIME).unwrap();
    assert!(panel.visible_panels().is_empty());
    assert_eq!(panel.selected(), Some(selected.id()));
}

#[test]
fn reselecting_recycles_panels() {
    let mut registry = EffectorRegistry::new(EffectorCatalog::builtin());
    let prefabs = PanelPrefabs::default().with_override(WAIT_TIME, "wait_panel");
    let mut panel = TriggerEditPanel::new(&mut registry, PrefabPool::new(), prefabs, |_: &str| true);
    let mut first = Trigger::new(TriggerId::new(1), AgentKind::Npc);
    let mut second = Trigger::new(TriggerId::new(2), AgentKind::Npc);
    registry.attach_key(&mut first, WAIT_TIME).unwrap();
    registry.attach_key(&mut second, WAIT_TIME).unwrap();

    panel.select(&registry, &first);
    let first_handle = panel.visible_panels()[0].1;
    assert_eq!(panel.with_pool(|pool| pool.prefab_of(first_handle).map(str::to_string)), Some("wait_panel".into()));

    panel.select(&registry, &second);
    assert_eq!(panel.visible_panels()[0].1, first_handle, "same prefab instance reused");
    assert_eq!(panel.with_pool(PrefabPool::stats).created, 1);

    panel.deinitialize(&mut registry);
    assert!(panel.visible_panels().is_empty());
    registry.attach_key(&mut second, CONTROL_TRIGGER).unwrap();
    assert!(panel.visible_panels().is_empty(), "deinitialized panels stop listening");
}

#[test]
fn paste_over_effectors_asks_first() {
    let answers = Rc::new(RefCell::new(vec![true, false]));
    let prompts = Rc::new(RefCell::new(Vec::new()));
    let dialog = {
        let answers = Rc::clone(&answers);
        let prompts = Rc::clone(&prompts);
        move |prompt: &str| {
            prompts.borrow_mut().push(prompt.to_string());
            answers.borrow_mut().pop().unwrap_or(false)
        }
    };
    let mut registry = EffectorRegistry::new(EffectorCatalog::builtin());
    let mut panel = TriggerEditPanel::new(&mut registry, PrefabPool::new(), PanelPrefabs::default(), dialog);

    let mut source = Trigger::new(TriggerId::new(1), AgentKind::Npc);
    let mut target = Trigger::new(TriggerId::new(2), AgentKind::Npc);
    assert_eq!(panel.paste(&mut registry, &mut target).unwrap(), PasteOutcome::NothingCopied);

    registry.attach_key(&mut source, WAIT_FOR_DISTANCE).unwrap();
    registry.attach_key(&mut source, CONTROL_TRIGGER).unwrap();
    panel.copy(&registry, &source);

    assert_eq!(panel.paste(&mut registry, &mut target).unwrap(), PasteOutcome::Pasted { removed: 0, added: 2 });
    assert!(prompts.borrow().is_empty(), "empty targets paste without asking");
    assert_eq!(visible_ids(&panel), attached_ids(&target));

    registry.attach_key(&mut target, WAIT_TIME).unwrap();
    assert_eq!(panel.paste(&mut registry, &mut target).unwrap(), PasteOutcome::Cancelled);
    assert_eq!(target.len(), 3);

    assert_eq!(panel.paste(&mut registry, &mut target).unwrap(), PasteOutcome::Pasted { removed: 3, added: 2 });
    assert_eq!(prompts.borrow().len(), 2);
    assert!(prompts.borrow()[0].contains("Replace 3 effector(s)"));
    assert_eq!(visible_ids(&panel), attached_ids(&target));
    assert_eq!(panel.available(), registry.snapshot(&target));
}

#[test]
fn custom_pools_see_every_panel_returned() {
    #[derive(Default)]
    struct CountingPool {
        next: u64,
        outstanding: i64,
        inner: PrefabPool,
    }

    impl PanelPool for CountingPool {
        fn get_instance(&mut self, prefab_key: &str) -> kestrel_scenario::pool::PanelHandle {
            self.next += 1;
            self.outstanding += 1;
            self.inner.get_instance(prefab_key)
        }

        fn return_instance(&mut self, handle: kestrel_scenario::pool::PanelHandle) {
            self.outstanding -= 1;
            self.inner.return_instance(handle);
        }
    }

    let mut registry = EffectorRegistry::new(EffectorCatalog::builtin());
    let mut panel: TriggerEditPanel<CountingPool> =
        TriggerEditPanel::new(&mut registry, CountingPool::default(), PanelPrefabs::default(), |_: &str| true);
    let mut trigger = Trigger::new(TriggerId::new(1), AgentKind::Pedestrian);
    for _ in 0..3 {
        panel.add_selected(&mut registry, &mut trigger, 0).unwrap();
    }
    assert_eq!(panel.with_pool(|pool| pool.outstanding), 3);
    panel.deselect();
    assert_eq!(panel.with_pool(|pool| (pool.outstanding, pool.next)), (0, 3));
}
