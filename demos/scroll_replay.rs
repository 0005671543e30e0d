//! Replay a scripted scroll session against a virtual page.
//!
//! Run with `RUST_LOG=debug` to see every trigger and scroll transition.

use std::rc::Rc;

use motion_trigger::{AnimationManager, Host, MotionConfig, VirtualHost};

const CONFIG: &str = r##"{
    "scroll_throttle_ms": 16,
    "elements": [
        { "selector": ".fade-in", "animation": { "type": "fade-in" } },
        { "selector": ".stagger", "animation": { "type": "fade-in", "class": "in" }, "delay_ms": 150 },
        {
            "selector": ".stat-number",
            "animation": { "type": "counter", "duration_ms": 1200, "format": { "suffix": "+", "separator": "," } }
        },
        {
            "selector": "#hero",
            "animation": {
                "type": "property",
                "targets": [
                    { "name": "opacity", "value": 1.0 },
                    { "name": "translateY", "value": 0.0, "unit": "px" }
                ],
                "duration_ms": 800,
                "easing": "quad-in-out"
            },
            "observe": { "threshold": 0.5, "root_margin": "0px" }
        }
    ],
    "scroll_effects": [
        { "selector": ".navbar", "threshold_px": 100, "class": "scrolled" }
    ]
}"##;

fn main() {
    env_logger::init();
    println!("=== Scroll Replay ===\n");

    let config = match MotionConfig::from_json(CONFIG) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let page = Rc::new(VirtualHost::new());
    let nav = page.add_element(".navbar");
    let hero = page.add_element("#hero");
    page.set_property(hero, "translateY", 40.0);
    let cards: Vec<_> = (0..3).map(|_| page.add_element(".fade-in")).collect();
    let staggered: Vec<_> = (0..3).map(|_| page.add_element(".stagger")).collect();
    let stat = page.add_element(".stat-number");
    page.set_text(stat, "25000");

    let mut manager = AnimationManager::new(Host::from_virtual(&page), config);
    match manager.start() {
        Ok(state) => println!("Manager state:  {state:?}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }

    // (scroll offset, elements that come into view)
    let script: Vec<(f64, Vec<_>)> = vec![
        (0.0, vec![hero]),
        (180.0, cards.clone()),
        (420.0, staggered.clone()),
        (900.0, vec![stat]),
        (40.0, cards.clone()),
    ];

    for (offset, visible) in script {
        page.scroll_to(offset);
        for element in visible {
            page.set_visibility(element, 0.8);
        }
        for _ in 0..20 {
            page.advance(16.0);
            page.run_frame();
        }
        println!(
            "  scroll {:>5.0}px  navbar scrolled: {:<5}  counter: {:<8}  triggered: {}",
            offset,
            page.has_class(nav, "scrolled"),
            page.text(stat).unwrap_or_default(),
            manager.triggered_count()
        );
    }

    page.run_until_idle(16.0, 500);
    println!();
    println!("  Hero opacity:   {:?}", page.property(hero, "opacity"));
    println!("  Counter:        {:?}", page.text(stat));
    println!("  Frames run:     {}", page.frames_run());

    if let Err(e) = manager.dispose() {
        eprintln!("{e}");
    }
    println!("  Listeners left: {}", page.listener_count());
}
