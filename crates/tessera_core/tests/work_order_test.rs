//! Integration test for system scheduling.

use std::cell::RefCell;
use std::rc::Rc;

use tessera_core::{
    CyclePolicy, EcsError, GlobalMemory, System, SystemConfig, SystemManager, SystemPriority,
};

type Trace = Rc<RefCell<Vec<&'static str>>>;

macro_rules! traced {
    ($name:ident, $priority:expr) => {
        struct $name(Trace);

        impl System for $name {
            fn update(&mut self, _dt: f64) {
                self.0.borrow_mut().push(stringify!($name));
            }

            fn name(&self) -> &'static str {
                stringify!($name)
            }

            fn priority(&self) -> SystemPriority {
                $priority
            }
        }
    };
}

traced!(Input, SystemPriority::NORMAL);
traced!(Physics, SystemPriority::NORMAL);
traced!(Animation, SystemPriority::NORMAL);
traced!(Render, SystemPriority::LOW);
traced!(Audio, SystemPriority(5));
traced!(Network, SystemPriority(10));

fn manager(policy: CyclePolicy) -> SystemManager {
    let config = SystemConfig { cycle_policy: policy };
    SystemManager::new(8 * 1024, &config, GlobalMemory::shared(1024 * 1024)).unwrap()
}

fn run_frame(systems: &mut SystemManager, trace: &Trace) -> Vec<&'static str> {
    trace.borrow_mut().clear();
    systems.pre_update(16.0);
    systems.update(16.0);
    systems.post_update(16.0);
    trace.borrow().clone()
}

#[test]
fn test_game_frame_order() {
    let trace = Trace::default();
    let mut systems = manager(CyclePolicy::Ignore);

    systems.add_system(Render(trace.clone())).unwrap();
    systems.add_system(Animation(trace.clone())).unwrap();
    systems.add_system(Physics(trace.clone())).unwrap();
    systems.add_system(Input(trace.clone())).unwrap();
    systems.add_system(Network(trace.clone())).unwrap();

    systems.add_system_dependency::<Physics, Input>().unwrap();
    systems.add_system_dependency::<Animation, Physics>().unwrap();
    systems.add_system_dependency::<Render, Animation>().unwrap();
    systems.update_system_work_order().unwrap();

    // One group at NORMAL (max member priority), Network alone at 10
    assert_eq!(
        run_frame(&mut systems, &trace),
        ["Input", "Physics", "Animation", "Render", "Network"]
    );
    assert_eq!(systems.groups().len(), 2);
    assert_eq!(systems.groups()[0].priority, SystemPriority::NORMAL);
}

#[test]
fn test_independent_groups_follow_priority() {
    let trace = Trace::default();
    let mut systems = manager(CyclePolicy::Ignore);

    systems.add_system(Audio(trace.clone())).unwrap();
    systems.add_system(Network(trace.clone())).unwrap();
    systems.update_system_work_order().unwrap();

    assert_eq!(run_frame(&mut systems, &trace), ["Network", "Audio"]);
}

#[test]
fn test_registration_after_update_needs_recompute() {
    let trace = Trace::default();
    let mut systems = manager(CyclePolicy::Ignore);

    systems.add_system(Input(trace.clone())).unwrap();
    systems.update_system_work_order().unwrap();
    systems.add_system(Physics(trace.clone())).unwrap();

    assert!(systems.is_work_order_stale());
    assert_eq!(run_frame(&mut systems, &trace), ["Input"]);

    systems.add_system_dependency::<Physics, Input>().unwrap();
    systems.update_system_work_order().unwrap();
    assert_eq!(run_frame(&mut systems, &trace), ["Input", "Physics"]);
}

#[test]
fn test_work_state_replay() {
    let trace = Trace::default();
    let mut systems = manager(CyclePolicy::Ignore);
    systems.add_system(Input(trace.clone())).unwrap();
    systems.add_system(Physics(trace.clone())).unwrap();
    systems.add_system(Render(trace.clone())).unwrap();
    systems.update_system_work_order().unwrap();

    let everything = systems.system_work_state();
    systems.disable_system::<Physics>().unwrap();
    let paused = systems.system_work_state();
    assert!(!run_frame(&mut systems, &trace).contains(&"Physics"));

    systems.set_system_work_state(&everything).unwrap();
    assert!(run_frame(&mut systems, &trace).contains(&"Physics"));

    systems.set_system_work_state(&paused).unwrap();
    assert_eq!(systems.system_work_state(), paused);

    assert!(matches!(
        systems.set_system_work_state(&paused[..2]),
        Err(EcsError::WorkStateMismatch { mask: 2, work_order: 3 })
    ));
}

#[test]
fn test_rejected_cycle_keeps_previous_order() {
    let trace = Trace::default();
    let mut systems = manager(CyclePolicy::Reject);
    systems.add_system(Input(trace.clone())).unwrap();
    systems.add_system(Physics(trace.clone())).unwrap();
    systems.add_system_dependency::<Physics, Input>().unwrap();
    systems.update_system_work_order().unwrap();

    systems.add_system_dependency::<Input, Physics>().unwrap();
    let error = systems.update_system_work_order().unwrap_err();

    assert!(error.to_string().contains("Input"));
    assert!(error.to_string().contains("Physics"));
    assert_eq!(run_frame(&mut systems, &trace), ["Input", "Physics"]);
}
