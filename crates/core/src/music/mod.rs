//! Music definition library.
//!
//! The library is declared in a key-value file whose section names are music
//! categories and whose values are comma-separated argument lists beginning
//! with the music filename (an XMI/MID name resolved through the VFS at
//! playback time). Individual entries that fail to parse are skipped with a
//! warning so one bad line cannot silence the whole soundtrack.

use std::collections::HashMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{keyvalue::KeyValueFile, Result};

const VALUE_SEPARATOR: char = ',';

/// Category a music definition belongs to; mirrors the section names of the
/// library file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MusicType {
    CharacterCreation,
    Cinematic,
    Interior,
    Jingle,
    MainMenu,
    Night,
    Swimming,
    Weather,
}

impl MusicType {
    pub const ALL: [MusicType; 8] = [
        MusicType::CharacterCreation,
        MusicType::Cinematic,
        MusicType::Interior,
        MusicType::Jingle,
        MusicType::MainMenu,
        MusicType::Night,
        MusicType::Swimming,
        MusicType::Weather,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MusicType::CharacterCreation => "CharacterCreation",
            MusicType::Cinematic => "Cinematic",
            MusicType::Interior => "Interior",
            MusicType::Jingle => "Jingle",
            MusicType::MainMenu => "MainMenu",
            MusicType::Night => "Night",
            MusicType::Swimming => "Swimming",
            MusicType::Weather => "Weather",
        }
    }

    fn from_section_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CinematicType {
    Intro,
    DreamGood,
    DreamBad,
    Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteriorType {
    Dungeon,
    Equipment,
    House,
    MagesGuild,
    Palace,
    Tavern,
    Temple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CityType {
    CityState,
    Town,
    Village,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimateType {
    Temperate,
    Desert,
    Mountain,
}

/// Weather a weather-category definition is written for. The extra arguments
/// (heavy fog, thunderstorm) distinguish variants of the same base weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    Overcast { heavy_fog: bool },
    Rain { thunderstorm: bool },
    Snow { overcast: bool, heavy_fog: bool },
}

/// Category-specific payload of a [`MusicDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MusicPayload {
    CharacterCreation,
    Cinematic(CinematicType),
    Interior(InteriorType),
    Jingle { city: CityType, climate: ClimateType },
    MainMenu,
    Night,
    Swimming,
    Weather(WeatherCondition),
}

/// One playable entry in the music library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicDefinition {
    pub filename: String,
    pub payload: MusicPayload,
}

impl MusicDefinition {
    pub fn music_type(&self) -> MusicType {
        match self.payload {
            MusicPayload::CharacterCreation => MusicType::CharacterCreation,
            MusicPayload::Cinematic(_) => MusicType::Cinematic,
            MusicPayload::Interior(_) => MusicType::Interior,
            MusicPayload::Jingle { .. } => MusicType::Jingle,
            MusicPayload::MainMenu => MusicType::MainMenu,
            MusicPayload::Night => MusicType::Night,
            MusicPayload::Swimming => MusicType::Swimming,
            MusicPayload::Weather(_) => MusicType::Weather,
        }
    }
}

/// Collection of every parsed music definition, grouped by category.
#[derive(Debug, Default)]
pub struct MusicLibrary {
    definitions: HashMap<MusicType, Vec<MusicDefinition>>,
}

impl MusicLibrary {
    /// Reads and parses a library file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_key_value(&KeyValueFile::open(path)?))
    }

    /// Builds a library from already-parsed key-value data. Unrecognized
    /// sections and unparsable entries are skipped with a warning.
    pub fn from_key_value(file: &KeyValueFile) -> Self {
        let mut definitions: HashMap<MusicType, Vec<MusicDefinition>> = HashMap::new();

        for section in file.sections() {
            let Some(music_type) = MusicType::from_section_name(section.name()) else {
                tracing::warn!(section = section.name(), "unrecognized music section");
                continue;
            };

            let entries = definitions.entry(music_type).or_default();
            for (key, value) in section.pairs() {
                match parse_value(value, music_type) {
                    Ok(definition) => entries.push(definition),
                    Err(reason) => {
                        tracing::warn!(
                            section = section.name(),
                            key,
                            value,
                            reason,
                            "skipping music definition"
                        );
                    }
                }
            }
        }

        Self { definitions }
    }

    /// Number of definitions in a category.
    pub fn count(&self, music_type: MusicType) -> usize {
        self.definitions
            .get(&music_type)
            .map_or(0, |definitions| definitions.len())
    }

    /// Indexed access within a category.
    pub fn get(&self, music_type: MusicType, index: usize) -> Option<&MusicDefinition> {
        self.definitions.get(&music_type)?.get(index)
    }

    /// First definition of a category, if any.
    pub fn first(&self, music_type: MusicType) -> Option<&MusicDefinition> {
        self.get(music_type, 0)
    }

    /// Uniform-random pick from a category.
    pub fn random(&self, music_type: MusicType, rng: &mut impl Rng) -> Option<&MusicDefinition> {
        self.definitions.get(&music_type)?.choose(rng)
    }

    /// Random pick from a category restricted to definitions accepted by the
    /// predicate. Candidates are visited in shuffled order so equally-good
    /// matches are chosen fairly.
    pub fn random_if(
        &self,
        music_type: MusicType,
        rng: &mut impl Rng,
        predicate: impl Fn(&MusicDefinition) -> bool,
    ) -> Option<&MusicDefinition> {
        let definitions = self.definitions.get(&music_type)?;
        let mut indices: Vec<usize> = (0..definitions.len()).collect();
        indices.shuffle(rng);

        indices
            .into_iter()
            .map(|index| &definitions[index])
            .find(|definition| predicate(definition))
    }
}

fn parse_value(value: &str, music_type: MusicType) -> std::result::Result<MusicDefinition, String> {
    let args: Vec<&str> = value.split(VALUE_SEPARATOR).map(str::trim).collect();
    if args.is_empty() || args[0].is_empty() {
        return Err("missing music filename".to_string());
    }

    let filename = args[0].to_string();
    let expect_args = |count: usize| {
        if args.len() == count {
            Ok(())
        } else {
            Err(format!("expected {count} arguments, found {}", args.len()))
        }
    };

    let payload = match music_type {
        MusicType::CharacterCreation => {
            expect_args(1)?;
            MusicPayload::CharacterCreation
        }
        MusicType::Cinematic => {
            expect_args(2)?;
            MusicPayload::Cinematic(parse_cinematic(args[1])?)
        }
        MusicType::Interior => {
            expect_args(2)?;
            MusicPayload::Interior(parse_interior(args[1])?)
        }
        MusicType::Jingle => {
            expect_args(3)?;
            MusicPayload::Jingle {
                city: parse_city(args[1])?,
                climate: parse_climate(args[2])?,
            }
        }
        MusicType::MainMenu => {
            expect_args(1)?;
            MusicPayload::MainMenu
        }
        MusicType::Night => {
            expect_args(1)?;
            MusicPayload::Night
        }
        MusicType::Swimming => {
            expect_args(1)?;
            MusicPayload::Swimming
        }
        MusicType::Weather => MusicPayload::Weather(parse_weather(&args)?),
    };

    Ok(MusicDefinition { filename, payload })
}

fn parse_cinematic(text: &str) -> std::result::Result<CinematicType, String> {
    match text {
        "Intro" => Ok(CinematicType::Intro),
        "DreamGood" => Ok(CinematicType::DreamGood),
        "DreamBad" => Ok(CinematicType::DreamBad),
        "Ending" => Ok(CinematicType::Ending),
        _ => Err(format!("unrecognized cinematic type \"{text}\"")),
    }
}

fn parse_interior(text: &str) -> std::result::Result<InteriorType, String> {
    match text {
        "Dungeon" => Ok(InteriorType::Dungeon),
        "Equipment" => Ok(InteriorType::Equipment),
        "House" => Ok(InteriorType::House),
        "MagesGuild" => Ok(InteriorType::MagesGuild),
        "Palace" => Ok(InteriorType::Palace),
        "Tavern" => Ok(InteriorType::Tavern),
        "Temple" => Ok(InteriorType::Temple),
        _ => Err(format!("unrecognized interior type \"{text}\"")),
    }
}

fn parse_city(text: &str) -> std::result::Result<CityType, String> {
    match text {
        "CityState" => Ok(CityType::CityState),
        "Town" => Ok(CityType::Town),
        "Village" => Ok(CityType::Village),
        _ => Err(format!("unrecognized city type \"{text}\"")),
    }
}

fn parse_climate(text: &str) -> std::result::Result<ClimateType, String> {
    match text {
        "Temperate" => Ok(ClimateType::Temperate),
        "Desert" => Ok(ClimateType::Desert),
        "Mountain" => Ok(ClimateType::Mountain),
        _ => Err(format!("unrecognized climate type \"{text}\"")),
    }
}

fn parse_weather(args: &[&str]) -> std::result::Result<WeatherCondition, String> {
    if args.len() < 2 {
        return Err("weather definition needs a weather type".to_string());
    }

    // All weather arguments (heavy fog, etc.) are bools.
    let parse_bool = |text: &str| {
        if text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if text.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(format!("unrecognized weather argument \"{text}\""))
        }
    };

    let expect_args = |count: usize| {
        if args.len() == count {
            Ok(())
        } else {
            Err(format!("expected {count} arguments, found {}", args.len()))
        }
    };

    match args[1] {
        "Clear" => {
            expect_args(2)?;
            Ok(WeatherCondition::Clear)
        }
        "Overcast" => {
            expect_args(3)?;
            Ok(WeatherCondition::Overcast {
                heavy_fog: parse_bool(args[2])?,
            })
        }
        "Rain" => {
            expect_args(3)?;
            Ok(WeatherCondition::Rain {
                thunderstorm: parse_bool(args[2])?,
            })
        }
        "Snow" => {
            expect_args(4)?;
            Ok(WeatherCondition::Snow {
                overcast: parse_bool(args[2])?,
                heavy_fog: parse_bool(args[3])?,
            })
        }
        other => Err(format!("unrecognized weather type \"{other}\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn library(text: &str) -> MusicLibrary {
        let file = KeyValueFile::parse(text, "test").unwrap();
        MusicLibrary::from_key_value(&file)
    }

    const SAMPLE: &str = "\
[MainMenu]
MainMenuSong=ARENA.XMI

[Interior]
TavernSong1=TAVERN.XMI,Tavern
TavernSong2=SQUARE.XMI,Tavern
PalaceSong=PALACE.XMI,Palace

[Jingle]
CityJingle=CITY.XMI,CityState,Temperate

[Weather]
ClearDay=SUNNYDAY.XMI,Clear
Storm=RAINING.XMI,Rain,True
HeavySnow=SNOWING.XMI,Snow,True,False
";

    #[test]
    fn parses_each_category() {
        let library = library(SAMPLE);

        assert_eq!(library.count(MusicType::MainMenu), 1);
        assert_eq!(library.count(MusicType::Interior), 3);
        assert_eq!(library.count(MusicType::Jingle), 1);
        assert_eq!(library.count(MusicType::Weather), 3);
        assert_eq!(library.count(MusicType::Swimming), 0);

        let jingle = library.first(MusicType::Jingle).unwrap();
        assert_eq!(jingle.filename, "CITY.XMI");
        assert_eq!(
            jingle.payload,
            MusicPayload::Jingle {
                city: CityType::CityState,
                climate: ClimateType::Temperate,
            }
        );

        // Pairs are key-sorted: ClearDay, HeavySnow, Storm.
        let storm = library.get(MusicType::Weather, 2).unwrap();
        assert_eq!(
            storm.payload,
            MusicPayload::Weather(WeatherCondition::Rain { thunderstorm: true })
        );
    }

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let library = library(
            "[Interior]\nGood=TAVERN.XMI,Tavern\nBadType=HOUSE.XMI,Casino\nBadCount=HOUSE.XMI\n",
        );
        assert_eq!(library.count(MusicType::Interior), 1);
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let library = library("[Karaoke]\nSong=SONG.XMI\n");
        for music_type in MusicType::ALL {
            assert_eq!(library.count(music_type), 0);
        }
    }

    #[test]
    fn random_selection_stays_in_category() {
        let library = library(SAMPLE);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..32 {
            let definition = library.random(MusicType::Interior, &mut rng).unwrap();
            assert_eq!(definition.music_type(), MusicType::Interior);
        }
        assert!(library.random(MusicType::Swimming, &mut rng).is_none());
    }

    #[test]
    fn predicate_filters_random_picks() {
        let library = library(SAMPLE);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..32 {
            let definition = library
                .random_if(MusicType::Interior, &mut rng, |definition| {
                    definition.payload == MusicPayload::Interior(InteriorType::Palace)
                })
                .unwrap();
            assert_eq!(definition.filename, "PALACE.XMI");
        }

        assert!(library
            .random_if(MusicType::Interior, &mut rng, |_| false)
            .is_none());
    }
}
