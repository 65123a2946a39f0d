//! Built-in demo world
//!
//! A small valley with a handful of rooms, a wandering deer, hostile
//! goblins, a quest-giving warden, and a lever puzzle — enough surface to
//! exercise every engine system from a local session.

pub const DEMO_WORLD: &str = r#"
[[areas]]
id = "embervale"
name = "Embervale"
biome = "forest"
ambient_sound = "Wind sighs through the pines."
entry_points = ["waystone"]
default_respawn_time = 60
time_scale = 1.0

[[rooms]]
id = "waystone"
name = "The Waystone"
description = "A mossy standing stone hums faintly at the heart of a clearing. Paths lead off between the pines."
room_type = "forest"
area_id = "embervale"
on_enter_effect = "The waystone's hum settles into your bones."
[rooms.exits]
north = "pine_path"
east = "old_mill"

[[rooms]]
id = "pine_path"
name = "Pine Path"
description = "Needles carpet a narrow track. Something small rustles in the undergrowth."
room_type = "forest"
area_id = "embervale"
[rooms.exits]
south = "waystone"
north = "cave_mouth"

[[rooms]]
id = "cave_mouth"
name = "Cave Mouth"
description = "A cold draft spills from a jagged opening in the hillside."
room_type = "underground"
area_id = "embervale"
[rooms.exits]
south = "pine_path"
down = "goblin_den"

[[rooms.triggers]]
id = "cave_warning"
event = "on_enter"
max_fires = -1
cooldown = 30.0
[[rooms.triggers.actions]]
type = "message_player"
text = "Scratched into the rock: TURN BACK."

[[rooms]]
id = "goblin_den"
name = "Goblin Den"
description = "Bones and rags litter a low cavern that reeks of old smoke."
room_type = "underground"
area_id = "embervale"
[rooms.exits]
up = "cave_mouth"

[[rooms]]
id = "old_mill"
name = "Old Mill"
description = "The mill wheel is long seized. A rusty lever juts from the wall beside the grindstone."
room_type = "rural"
area_id = "embervale"
[rooms.exits]
west = "waystone"

[[rooms.triggers]]
id = "mill_lever"
event = "on_command"
command_pattern = "pull*lever"
max_fires = 1
[[rooms.triggers.actions]]
type = "message_room"
text = "The lever grinds over. Somewhere below, a counterweight drops and floorboards swing open."
[[rooms.triggers.actions]]
type = "override_room_exits"
[rooms.triggers.actions.exits]
down = "mill_cellar"

[[rooms]]
id = "mill_cellar"
name = "Mill Cellar"
description = "Dust sheets over crates of forgotten grain. Something glitters between them."
room_type = "underground"
area_id = "embervale"
[rooms.exits]
up = "old_mill"

[[item_templates]]
id = "rusty_sword"
name = "rusty sword"
description = "Pitted but serviceable."
keywords = ["sword", "rusty"]
item_type = "weapon"
weight = 3.0
value = 8
equipment_slot = "weapon"
[item_templates.weapon]
name = "rusty sword"
damage_min = 2
damage_max = 5
damage_type = "slashing"
windup_time = 0.8
swing_time = 0.9

[[item_templates]]
id = "healing_draught"
name = "healing draught"
description = "Red liquid in a stoppered vial."
keywords = ["draught", "potion"]
item_type = "consumable"
weight = 0.5
value = 12
max_stack_size = 5
is_consumable = true
[item_templates.consume_effect]
name = "Mending"
effect_type = "hot"
magnitude = 30

[[item_templates]]
id = "goblin_ear"
name = "goblin ear"
description = "A leathery trophy."
keywords = ["ear"]
item_type = "misc"
weight = 0.1
value = 2
max_stack_size = 10

[[item_templates]]
id = "miller_locket"
name = "tarnished locket"
description = "A locket stamped with the mill's crest."
keywords = ["locket"]
item_type = "misc"
weight = 0.2
value = 25

[[npc_templates]]
id = "goblin"
name = "cave goblin"
description = "A scrawny goblin with hungry eyes."
keywords = ["goblin"]
npc_type = "hostile"
level = 2
max_health = 18
armor_class = 8
strength = 8
experience_reward = 35
behaviors = ["aggressive", "calls_for_help"]
[npc_templates.weapon]
name = "jagged shiv"
damage_min = 1
damage_max = 3
damage_type = "piercing"
windup_time = 1.2
swing_time = 1.0
[[npc_templates.drop_table]]
template_id = "goblin_ear"
chance = 0.8
quantity = 1
[[npc_templates.drop_table]]
template_id = "healing_draught"
chance = 0.2
quantity = 1

[[npc_templates]]
id = "deer"
name = "red deer"
description = "A skittish deer that keeps its distance."
keywords = ["deer"]
npc_type = "neutral"
max_health = 12
behaviors = ["wanders_sometimes", "pacifist", "idle_chatter"]
idle_messages = [
    "The red deer's ears twitch.",
    "The red deer crops a mouthful of grass.",
]

[[npc_templates]]
id = "warden"
name = "Road Warden Senna"
description = "A weathered warden leaning on a spear."
keywords = ["warden", "senna"]
npc_type = "friendly"
level = 6
max_health = 80
behaviors = ["stationary", "defensive"]
[npc_templates.dialogue]
start = "greet"
[npc_templates.dialogue.nodes.greet]
text = "Goblins out of the cave again. I'd pay to see fewer of them."
[[npc_templates.dialogue.nodes.greet.options]]
text = "I'll thin them out."
offer_quest = "cull_the_den"
[[npc_templates.dialogue.nodes.greet.options]]
text = "Any other work?"
next = "work"
[npc_templates.dialogue.nodes.work]
text = "The old miller lost a locket in the cellar. Lever by the grindstone opens it, if it still moves."
[[npc_templates.dialogue.nodes.work.options]]
text = "I'll keep an eye out."

[[quest_templates]]
id = "cull_the_den"
name = "Cull the Den"
description = "Road Warden Senna wants the goblin den thinned out."
xp_reward = 120
[[quest_templates.objectives]]
type = "kill"
template_id = "goblin"
count = 3

[[npcs]]
template_id = "warden"
room_id = "waystone"

[[npcs]]
template_id = "deer"
room_id = "pine_path"

[[npcs]]
template_id = "goblin"
room_id = "goblin_den"

[[npcs]]
template_id = "goblin"
room_id = "goblin_den"

[[npcs]]
template_id = "goblin"
room_id = "cave_mouth"

[[items]]
template_id = "rusty_sword"
room_id = "waystone"

[[items]]
template_id = "healing_draught"
room_id = "old_mill"
quantity = 2

[[items]]
template_id = "miller_locket"
room_id = "mill_cellar"
"#;
