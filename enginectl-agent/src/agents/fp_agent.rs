// ABOUTME: Financial planner agent for household budget and life-plan consultations.
// ABOUTME: Gives general guidance only; never gives specific investment advice.

use crate::definition::AgentDefinition;
use crate::registry::AgentEntry;

pub const NAME: &str = "fp_agent";

const MODEL: &str = "gemini-2.5-flash";
const DISPLAY_NAME: &str = "poc_if_agent_engine_fp_02";
const DESCRIPTION: &str = "家計・ライフプラン相談用ファイナンシャルプランナーエージェント";
const INSTRUCTION: &str = "あなたはファイナンシャルプランナーです。\
ユーザーの家計やライフプランに関する相談に応じ、わかりやすく助言を行ってください。\
具体的な投資助言は行わず、一般的なアドバイスにとどめてください。\
常にファイナンシャルプランナーとして振る舞ってください。";

pub fn entry() -> AgentEntry {
    AgentEntry {
        definition: AgentDefinition::new(NAME, MODEL, INSTRUCTION),
        display_name: Some(DISPLAY_NAME.to_string()),
        description: DESCRIPTION.to_string(),
    }
}
