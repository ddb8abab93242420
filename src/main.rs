use clap::{Parser, Subcommand};
use quickwheel::category::Category;
use quickwheel::config::{self, Settings};
use quickwheel::events::{TriggerEvent, WheelEvent};
use quickwheel::item::{Item, Quality};
use quickwheel::sys::host::{EquipSlot, Host, Shared, WheelView, shared};
use quickwheel::sys::memory::{MemoryActor, MemoryEquipment, MemoryInventory, MemoryQuickSlots};
use quickwheel::wheel::WheelEngine;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quickwheel", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file to use instead of the one in the user config directory
    #[arg(short = 's', long)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Write the default settings file if there is none yet.
    Init,
    /// Run a scripted session against an in-memory inventory.
    Demo {
        /// Ticks to run after the selected item is consumed
        #[arg(short = 't', long, default_value_t = 6)]
        ticks: u32,
    },
    /// Print the resolved settings.
    Settings,
}

/// Prints what a real wheel widget would draw.
#[derive(Default)]
struct ConsoleView {
    category: Option<Category>,
}

impl WheelView for ConsoleView {
    fn set_slots(&mut self, category: Category, slots: &[Option<Item>]) {
        self.category = Some(category);
        let names: Vec<String> = slots
            .iter()
            .map(|s| match s {
                Some(item) => {
                    let c = item.quality.color();
                    let (r, g, b) = (to_u8(c.red), to_u8(c.green), to_u8(c.blue));
                    format!("{} #{:02x}{:02x}{:02x}", item.name, r, g, b)
                }
                None => "-".to_string(),
            })
            .collect();
        println!("[{}] {}", category, names.join(" | "));
    }

    fn set_selected_index(&mut self, index: Option<usize>) {
        if let Some(category) = self.category {
            println!("[{}] selected {:?}", category, index);
        }
    }

    fn show(&mut self, category: Category) {
        println!("[{}] shown", category);
    }

    fn hide(&mut self, execute_selection_on_hide: bool) {
        println!("hidden (execute: {})", execute_selection_on_hide);
    }

    fn notify(&mut self, message: &str) {
        println!("! {}", message);
    }
}

fn to_u8(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => config::load_settings_from(path.clone())?,
        None => config::load_or_default(),
    };

    match cli.command {
        Some(Commands::Init) => {
            let path = config::write_default_settings()?;
            println!("Settings at {}", path.display());
            Ok(())
        }
        Some(Commands::Settings) => {
            println!("{:#?}", settings);
            Ok(())
        }
        Some(Commands::Demo { ticks }) => run_demo(settings, ticks),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn sample_host() -> (Host, Shared<MemoryInventory>) {
    let mut backpack = MemoryInventory::new(1, 12);
    backpack.put(0, Item::new(1, "bandage", "Bandage").tagged("Healing"));
    backpack.put(
        2,
        Item::new(2, "medkit", "Army Medkit")
            .tagged("Medic")
            .with_quality(Quality::Rare),
    );
    backpack.put(3, Item::new(3, "grenade_f1", "F-1").tagged("Grenade"));
    backpack.put(5, Item::new(4, "salve", "Salve").tagged("Healing"));
    backpack.put(7, Item::new(5, "grenade_f1", "F-1").tagged("Grenade"));
    backpack.put(8, Item::new(6, "svd", "SVD").tagged("Gun").with_quality(Quality::Epic));
    backpack.put_container(
        9,
        Item::new(7, "pouch", "Pouch"),
        vec![Some(Item::new(8, "stim", "Stimpak").tagged("Injector")), None],
    );

    let equipment = MemoryEquipment::default()
        .with(EquipSlot::PrimaryWeapon, Item::new(9, "ak", "AK-74").tagged("Gun"))
        .with(EquipSlot::Melee, Item::new(10, "knife", "Knife").tagged("MeleeWeapon"));

    let backpack = shared(backpack);
    let host = Host {
        primary: backpack.clone(),
        secondary: None,
        equipment: shared(equipment),
        quick_slots: shared(MemoryQuickSlots::default()),
        actor: shared(MemoryActor::default()),
        view: shared(ConsoleView::default()),
    };
    (host, backpack)
}

fn run_demo(settings: Settings, ticks: u32) -> anyhow::Result<()> {
    let (host, backpack) = sample_host();
    let mut engine = WheelEngine::new(settings);
    let tx = engine.events();
    let _watcher = match config::watch_settings(tx.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log::warn!("Settings changes will not be picked up: {}", e);
            None
        }
    };
    engine.start_session(host);

    println!("-- open the medical wheel");
    engine.on_trigger(Category::Medical, TriggerEvent::Pressed);
    engine.on_trigger(Category::Medical, TriggerEvent::Held);
    engine.on_selection_changed(Category::Medical, 1);
    engine.on_trigger(Category::Medical, TriggerEvent::Released);

    println!("-- drag slot 0 onto slot 2");
    if let Err(e) = engine.on_slots_swapped(Category::Medical, 0, 2) {
        anyhow::bail!("swap failed: {}", e);
    }

    println!("-- the selected item is used up");
    let selected = engine
        .wheel(Category::Medical)
        .and_then(|w| w.selected_item().cloned());
    if let Some(item) = selected {
        let index = backpack.borrow().position_of(item.id);
        if let Some(index) = index {
            backpack.borrow_mut().remove(index);
        }
        tx.try_send(WheelEvent::ItemRemoved(item.id))?;
    }
    for _ in 0..ticks {
        engine.tick();
    }

    println!("-- quick-use a grenade and swap guns");
    tx.try_send(WheelEvent::Trigger(Category::Explosive, TriggerEvent::Pressed))?;
    tx.try_send(WheelEvent::Trigger(Category::Explosive, TriggerEvent::Released))?;
    engine.tick();
    engine.on_trigger(Category::Gun, TriggerEvent::Held);
    engine.on_trigger(Category::Gun, TriggerEvent::Scroll(1));
    engine.on_trigger(Category::Gun, TriggerEvent::Released);

    engine.end_session();
    Ok(())
}
