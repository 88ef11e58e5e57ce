//! Species and skill catalogs read from the client's XML assets.

use std::collections::HashMap;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{LearnableSkill, Skill, SkillCategory, Species};
use crate::battle::{BaseStats, GrowthClass};

/// Owned `(name, value)` pairs of an element; malformed attributes are skipped
fn attributes(element: &BytesStart<'_>) -> Vec<(String, String)> {
    element
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Lenient numeric attribute; anything unparsable reads as the default
fn num<T: FromStr + Default>(value: &str) -> T {
    value.trim().parse().unwrap_or_default()
}

fn local_name(element: &BytesStart<'_>) -> Vec<u8> {
    element.local_name().as_ref().to_vec()
}

/// Parse `<Move>` entries of a skill catalog
pub fn parse_skills(xml: &str) -> Result<HashMap<u32, Skill>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut skills = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(&e) == b"Move" => {
                let mut skill = Skill {
                    power: 0,
                    max_pp: 35,
                    ..Skill::fallback(0)
                };
                for (key, value) in attributes(&e) {
                    match key.as_str() {
                        "ID" => skill.id = num(&value),
                        "Power" => skill.power = num(&value),
                        "MaxPP" => skill.max_pp = num(&value),
                        "Type" => skill.element = num(&value),
                        "Accuracy" => skill.accuracy = num(&value),
                        "Category" => skill.category = SkillCategory::from_id(num(&value)),
                        "SideEffect" => skill.side_effect = num(&value),
                        "CritRate" => skill.crit_rate = num(&value),
                        _ => {}
                    }
                }
                if skill.id > 0 {
                    skills.insert(skill.id, skill);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(skills)
}

/// Parse `<Monster>` entries of a species catalog, including their
/// `<LearnableMoves>` lists
pub fn parse_species(xml: &str) -> Result<HashMap<u32, Species>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut species = HashMap::new();
    let mut current: Option<Species> = None;
    let mut in_learnable = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(&e).as_slice() {
                b"Monster" => current = Some(monster(&e)),
                b"LearnableMoves" => in_learnable = current.is_some(),
                b"Move" => learnable_move(&e, in_learnable, current.as_mut()),
                _ => {}
            },
            Event::Empty(e) => match local_name(&e).as_slice() {
                b"Monster" => finish(&mut species, Some(monster(&e))),
                b"Move" => learnable_move(&e, in_learnable, current.as_mut()),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"LearnableMoves" => in_learnable = false,
                b"Monster" => {
                    finish(&mut species, current.take());
                    in_learnable = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(species)
}

fn monster(element: &BytesStart<'_>) -> Species {
    let mut base = BaseStats::default();
    let mut species = Species {
        id: 0,
        name: String::new(),
        base,
        growth: GrowthClass::default(),
        element: 0,
        base_exp: 0,
        learnable: Vec::new(),
    };
    for (key, value) in attributes(element) {
        match key.as_str() {
            "ID" => species.id = num(&value),
            "DefName" | "Name" => species.name = value,
            "Hp" | "HP" => base.hp = num(&value),
            "Atk" => base.attack = num(&value),
            "Def" => base.defence = num(&value),
            "SpAtk" | "SpA" => base.special_attack = num(&value),
            "SpDef" | "SpD" => base.special_defence = num(&value),
            "Spd" | "Speed" => base.speed = num(&value),
            "GrowthType" => species.growth = GrowthClass::from_id(num(&value)),
            "Type" => species.element = num(&value),
            "YieldingExp" | "BaseExp" => species.base_exp = num(&value),
            _ => {}
        }
    }
    species.base = base;
    species
}

fn learnable_move(element: &BytesStart<'_>, in_learnable: bool, current: Option<&mut Species>) {
    let Some(species) = current.filter(|_| in_learnable) else {
        return;
    };
    let mut skill = LearnableSkill { skill_id: 0, level: 0 };
    for (key, value) in attributes(element) {
        match key.as_str() {
            "ID" => skill.skill_id = num(&value),
            "LearningLv" => skill.level = num(&value),
            _ => {}
        }
    }
    if skill.skill_id > 0 {
        species.learnable.push(skill);
    }
}

fn finish(out: &mut HashMap<u32, Species>, species: Option<Species>) {
    if let Some(species) = species.filter(|s| s.id > 0) {
        out.insert(species.id, species);
    }
}
