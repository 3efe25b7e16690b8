use serde::{Deserialize, Serialize};

use super::trigger::TriggerKind;

/// Case the sample card is built from.
pub const SAMPLE_CASE: &str = "案例背景：
- 角色：华东区销售总监
- 目标：年底前业绩达成 1.2亿，市占率重返前三
- 现状：团队动力不足、竞对价格战、CRM流程低效
- 资源：可申请特批价，有直销试点权限";

/// Content of a GROW card. Every field may be missing in model output;
/// the renderer substitutes defaults for empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrowCardPayload {
    pub goal: String,
    pub reality: Vec<String>,
    pub options: Vec<String>,
    pub will: Vec<String>,
    pub slogan_cn: String,
    pub footer_sub: String,
}

impl GrowCardPayload {
    /// Payload used whenever model output is missing or unusable.
    pub fn fallback() -> Self {
        Self {
            goal: "年底前华东区业绩达成 <span class=\"highlight-text\">1.2亿</span> ，市占率重返前三，守住大区总监职位。".into(),
            reality: vec![
                "团队动力不足：人均月拜访仅15家，远低于战斗状态。".into(),
                "竞对价格战：“宏远科技”报价低于我方底价10%。".into(),
                "内部流程低效：报价审批长达3天，错失商机。".into(),
            ],
            options: vec![
                "组织动刀：合并冗余办事处，集中资源重奖高绩效者。".into(),
                "申请特价：准备商业案例，向总部申请阶段性特批价。".into(),
                "渠道博弈：评估风险，在重点区域试点直销。".into(),
            ],
            will: vec![
                "今晚：准备商业案例，与财务总监沟通500万促销预算。".into(),
                "下周一：飞抵上海，亲自带队攻坚“天成集团”等TOP3客户。".into(),
                "本周五前：完成华东区销售半年复盘，进行严肃绩效面谈。".into(),
            ],
            slogan_cn: "拒绝模糊，用行动定义结果".into(),
            footer_sub: "EXECUTIVE INSIDER, POWER YOUR DECISION".into(),
        }
    }
}

const JSON_CONTRACT: &str = r#"请只输出 JSON，不要输出其它文字或 Markdown。
JSON 格式：
{
  "goal": "一句话目标，可包含 <span class=\"highlight-text\">关键数字</span>",
  "reality": ["现状1", "现状2", "现状3"],
  "options": ["方案1", "方案2", "方案3"],
  "will": ["即刻：...", "本周：...", "机制：..."],
  "sloganCn": "中文标语",
  "footerSub": "英文副标题"
}"#;

/// Prompt asking the composer for card data as JSON.
pub fn data_prompt(tool_prompt: &str, kind: TriggerKind, message: &str) -> String {
    let request = match kind {
        TriggerKind::Sample => format!(
            "请基于以下具体案例生成卡片内容，不要提及“样本/模板/示例”等字样。\n{SAMPLE_CASE}"
        ),
        TriggerKind::Card => format!("当前用户请求：{message}"),
    };
    format!("{tool_prompt}\n\n{request}\n\n{JSON_CONTRACT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_camel_case_keys_and_tolerates_gaps() {
        let p: GrowCardPayload =
            serde_json::from_str(r#"{"goal":"g","will":["a"],"sloganCn":"s"}"#).unwrap();
        assert_eq!(p.goal, "g");
        assert_eq!(p.will, vec!["a".to_string()]);
        assert_eq!(p.slogan_cn, "s");
        assert!(p.reality.is_empty());
        assert!(p.footer_sub.is_empty());
    }

    #[test]
    fn sample_prompt_embeds_case_not_message() {
        let p = data_prompt("TOOL", TriggerKind::Sample, "给个例子");
        assert!(p.starts_with("TOOL\n\n"));
        assert!(p.contains("华东区销售总监"));
        assert!(!p.contains("当前用户请求"));
        assert!(p.contains("\"sloganCn\""));
    }

    #[test]
    fn card_prompt_embeds_message() {
        let p = data_prompt("TOOL", TriggerKind::Card, "生成卡片");
        assert!(p.contains("当前用户请求：生成卡片"));
        assert!(!p.contains(SAMPLE_CASE));
    }
}
