//! Static catalog of guessable sounds

use rand::seq::SliceRandom;

use crate::models::Difficulty::{Easy, Hard, Medium};
use crate::models::{Difficulty, Sound};

const fn sound(
    id: &'static str,
    name: &'static str,
    category: &'static str,
    description: &'static str,
    difficulty: Difficulty,
) -> Sound {
    Sound {
        id,
        name,
        category,
        description,
        difficulty,
    }
}

pub static SOUND_LIBRARY: &[Sound] = &[
    sound("elephant", "Elephant", "Animals", "Trumpeting elephant sound", Easy),
    sound("lion", "Lion", "Animals", "Lion roaring", Easy),
    sound("cat", "Cat", "Animals", "Cat meowing", Easy),
    sound("dog", "Dog", "Animals", "Dog barking", Easy),
    sound("cow", "Cow", "Animals", "Cow mooing", Easy),
    sound("pig", "Pig", "Animals", "Pig oinking", Easy),
    sound("sheep", "Sheep", "Animals", "Sheep bleating", Easy),
    sound("horse", "Horse", "Animals", "Horse neighing", Medium),
    sound("chicken", "Chicken", "Animals", "Chicken clucking", Easy),
    sound("duck", "Duck", "Animals", "Duck quacking", Easy),
    sound("owl", "Owl", "Animals", "Owl hooting", Medium),
    sound("wolf", "Wolf", "Animals", "Wolf howling", Medium),
    sound("monkey", "Monkey", "Animals", "Monkey chattering", Medium),
    sound("frog", "Frog", "Animals", "Frog croaking", Easy),
    sound("bee", "Bee", "Animals", "Bee buzzing", Easy),
    sound("snake", "Snake", "Animals", "Snake hissing", Medium),
    sound("dolphin", "Dolphin", "Animals", "Dolphin clicking", Hard),
    sound("whale", "Whale", "Animals", "Whale singing", Hard),
    sound("car_horn", "Car Horn", "Vehicles", "Car horn honking", Easy),
    sound("ambulance", "Ambulance", "Vehicles", "Ambulance siren", Easy),
    sound("fire_truck", "Fire Truck", "Vehicles", "Fire truck siren", Easy),
    sound("police_car", "Police Car", "Vehicles", "Police car siren", Easy),
    sound("motorcycle", "Motorcycle", "Vehicles", "Motorcycle engine", Medium),
    sound("truck", "Truck", "Vehicles", "Truck horn", Easy),
    sound("train", "Train", "Vehicles", "Train whistle", Medium),
    sound("airplane", "Airplane", "Vehicles", "Airplane engine", Medium),
    sound("helicopter", "Helicopter", "Vehicles", "Helicopter blades", Medium),
    sound("boat", "Boat", "Vehicles", "Boat horn", Easy),
    sound("subway", "Subway", "Vehicles", "Subway train", Medium),
    sound("guitar", "Guitar", "Instruments", "Guitar strumming", Medium),
    sound("piano", "Piano", "Instruments", "Piano keys", Medium),
    sound("drums", "Drums", "Instruments", "Drum beat", Easy),
    sound("violin", "Violin", "Instruments", "Violin playing", Hard),
    sound("trumpet", "Trumpet", "Instruments", "Trumpet blast", Medium),
    sound("saxophone", "Saxophone", "Instruments", "Saxophone jazz", Medium),
    sound("flute", "Flute", "Instruments", "Flute melody", Hard),
    sound("harmonica", "Harmonica", "Instruments", "Harmonica blues", Medium),
    sound("accordion", "Accordion", "Instruments", "Accordion polka", Medium),
    sound("bagpipes", "Bagpipes", "Instruments", "Bagpipes drone", Hard),
    sound("doorbell", "Doorbell", "Household", "Doorbell ringing", Easy),
    sound("phone", "Phone", "Household", "Phone ringing", Easy),
    sound("alarm_clock", "Alarm Clock", "Household", "Alarm clock beeping", Easy),
    sound("microwave", "Microwave", "Household", "Microwave ding", Easy),
    sound("blender", "Blender", "Household", "Blender whirring", Medium),
    sound("vacuum", "Vacuum", "Household", "Vacuum cleaner", Medium),
    sound("washing_machine", "Washing Machine", "Household", "Washing machine cycle", Medium),
    sound("dishwasher", "Dishwasher", "Household", "Dishwasher running", Medium),
    sound("toaster", "Toaster", "Household", "Toaster pop", Easy),
    sound("coffee_maker", "Coffee Maker", "Household", "Coffee brewing", Medium),
    sound("refrigerator", "Refrigerator", "Household", "Refrigerator hum", Medium),
    sound("thunder", "Thunder", "Nature", "Thunder clap", Easy),
    sound("rain", "Rain", "Nature", "Rain falling", Medium),
    sound("wind", "Wind", "Nature", "Wind blowing", Medium),
    sound("waves", "Ocean Waves", "Nature", "Ocean waves crashing", Medium),
    sound("waterfall", "Waterfall", "Nature", "Waterfall rushing", Medium),
    sound("stream", "Stream", "Nature", "Stream bubbling", Hard),
    sound("fire", "Fire", "Nature", "Fire crackling", Medium),
    sound("volcano", "Volcano", "Nature", "Volcano rumbling", Hard),
    sound("avalanche", "Avalanche", "Nature", "Avalanche crashing", Hard),
    sound("sneeze", "Sneeze", "Human", "Person sneezing", Easy),
    sound("cough", "Cough", "Human", "Person coughing", Easy),
    sound("laugh", "Laugh", "Human", "Person laughing", Easy),
    sound("cry", "Cry", "Human", "Person crying", Medium),
    sound("whistle", "Whistle", "Human", "Person whistling", Medium),
    sound("clap", "Clap", "Human", "Hands clapping", Easy),
    sound("footsteps", "Footsteps", "Human", "Footsteps walking", Medium),
    sound("heartbeat", "Heartbeat", "Human", "Heart beating", Hard),
    sound("snore", "Snore", "Human", "Person snoring", Easy),
    sound("hiccup", "Hiccup", "Human", "Person hiccuping", Medium),
    sound("chainsaw", "Chainsaw", "Machines", "Chainsaw cutting", Medium),
    sound("lawn_mower", "Lawn Mower", "Machines", "Lawn mower running", Medium),
    sound("jackhammer", "Jackhammer", "Machines", "Jackhammer drilling", Medium),
    sound("drill", "Drill", "Machines", "Power drill", Medium),
    sound("saw", "Saw", "Machines", "Circular saw cutting", Medium),
    sound("generator", "Generator", "Machines", "Generator running", Medium),
    sound("air_compressor", "Air Compressor", "Machines", "Air compressor", Medium),
    sound("conveyor_belt", "Conveyor Belt", "Machines", "Conveyor belt moving", Hard),
    sound("printing_press", "Printing Press", "Machines", "Printing press", Hard),
    sound("cash_register", "Cash Register", "Machines", "Cash register ding", Easy),
    sound("basketball", "Basketball", "Sports", "Basketball bouncing", Easy),
    sound("tennis", "Tennis", "Sports", "Tennis ball hit", Medium),
    sound("golf", "Golf", "Sports", "Golf club swing", Medium),
    sound("bowling", "Bowling", "Sports", "Bowling ball rolling", Medium),
    sound("ping_pong", "Ping Pong", "Sports", "Ping pong ball", Medium),
    sound("pool", "Pool", "Sports", "Pool ball hitting", Medium),
    sound("archery", "Archery", "Sports", "Bow and arrow", Hard),
    sound("fishing", "Fishing", "Sports", "Fishing line cast", Hard),
    sound("skateboard", "Skateboard", "Sports", "Skateboard rolling", Medium),
    sound("roller_skates", "Roller Skates", "Sports", "Roller skates", Medium),
];

/// Pick a sound uniformly at random.
pub fn random_sound() -> &'static Sound {
    random_sound_with(&mut rand::thread_rng())
}

pub fn random_sound_with<R: rand::Rng + ?Sized>(rng: &mut R) -> &'static Sound {
    // The catalog is a non-empty constant.
    SOUND_LIBRARY.choose(rng).unwrap_or(&SOUND_LIBRARY[0])
}

pub fn sounds_by_category(category: &str) -> Vec<&'static Sound> {
    SOUND_LIBRARY
        .iter()
        .filter(|s| s.category == category)
        .collect()
}

pub fn sounds_by_difficulty(difficulty: Difficulty) -> Vec<&'static Sound> {
    SOUND_LIBRARY
        .iter()
        .filter(|s| s.difficulty == difficulty)
        .collect()
}

/// Distinct categories in catalog order.
pub fn categories() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for sound in SOUND_LIBRARY {
        if !out.contains(&sound.category) {
            out.push(sound.category);
        }
    }
    out
}

pub fn find_sound(id: &str) -> Option<&'static Sound> {
    SOUND_LIBRARY.iter().find(|s| s.id == id)
}
