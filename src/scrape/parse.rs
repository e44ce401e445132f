//! HTML extraction for the Buckler profile pages.
//!
//! The site exposes no stable machine identifiers: every selector here is a
//! substring match on generated class names, and every statistic is located
//! by its visible label text. When the markup drifts, extraction degrades to
//! zeroed fields or dropped rows rather than failing the run.

use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};

use crate::models::{ControlType, MatchRecord, PerformanceStats, PlayerSide};

/// Visible text of the tab that opens the achievements view.
pub const PERFORMANCE_TAB_LABEL: &str = "実績";

const BATTLE_DATE_FORMAT: &str = "%Y/%m/%d %H:%M";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid selector")
}

fn inner_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Strip everything but digits and the decimal point, then parse. "57.1%"
/// and "1,543" both come out as numbers; unparseable text defaults to zero.
fn numeric(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

fn digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Extract the play-style statistics from the rendered achievements view.
/// Labels that are missing or renamed leave their field at zero.
pub fn parse_performance(html: &str) -> PerformanceStats {
    let document = Html::parse_document(html);
    let mut stats = PerformanceStats::default();

    // Drive gauge / super art usage rates render as a list of labelled
    // percentages.
    let style_sel = selector(r#"li[class*="battle_style_"]"#);
    let type_sel = selector(r#"[class*="battle_style_type"]"#);
    let number_sel = selector(r#"[class*="battle_style_number"]"#);

    for item in document.select(&style_sel) {
        let Some(label) = item.select(&type_sel).next().map(inner_text) else {
            continue;
        };
        let value = item
            .select(&number_sel)
            .next()
            .map(|el| numeric(&inner_text(el)))
            .unwrap_or(0.0);

        match label.as_str() {
            "ドライブパリィ" => stats.d_parry_pct = value,
            "ドライブインパクト" => stats.d_impact_pct = value,
            "オーバードライブアーツ" => stats.d_od_pct = value,
            "パリィドライブラッシュ" => stats.d_rush_p_pct = value,
            "キャンセルドライブラッシュ" => stats.d_rush_c_pct = value,
            "ドライブリバーサル" => stats.d_reversal_pct = value,
            "Lv1" => stats.sa1_pct = value,
            "Lv2" => stats.sa2_pct = value,
            "Lv3" => stats.sa3_pct = value,
            "CA" => stats.ca_pct = value,
            _ => {}
        }
    }

    // Counter groups render as <dl> blocks: a <dt> title, then label/value
    // span pairs. The value renders in the span immediately after its label.
    let dl_sel = selector("dl");
    let dt_sel = selector("dt");
    let span_sel = selector("span");

    for dl in document.select(&dl_sel) {
        let Some(title) = dl.select(&dt_sel).next().map(inner_text) else {
            continue;
        };
        let spans: Vec<String> = dl.select(&span_sel).map(inner_text).collect();
        let get = |label: &str| -> f64 {
            spans
                .iter()
                .position(|s| s == label)
                .and_then(|i| spans.get(i + 1))
                .map(|s| numeric(s))
                .unwrap_or(0.0)
        };

        match title.as_str() {
            "ドライブパリィ" => {
                stats.just_parry_count = get("ジャストパリィ回数");
            }
            "ドライブインパクト" => {
                stats.impact_win = get("決めた回数");
                stats.impact_pc_win = get("パニッシュカウンターを決めた回数");
                stats.impact_counter_win = get("相手のドライブインパクトに決めた回数");
                stats.impact_lose = get("受けた回数");
                stats.impact_pc_lose = get("パニッシュカウンターを受けた回数");
                stats.impact_counter_lose = get("相手にドライブインパクトで返された回数");
            }
            "スタン" => {
                stats.stun_win = get("スタンさせた回数");
                stats.stun_lose = get("スタンさせられた回数");
            }
            "投げ" => {
                stats.throw_win = get("決めた回数");
                stats.throw_lose = get("受けた回数");
                stats.throw_escape = get("投げ抜け回数");
            }
            "壁際" => {
                stats.wall_push_sec = get("相手を追い詰めている時間");
                stats.wall_pushed_sec = get("相手に追い詰められている時間");
            }
            _ => {}
        }
    }

    stats
}

/// Extract all visible match rows from a rendered battle-log page.
/// Rows without a parseable date are dropped.
pub fn parse_battle_rows(html: &str) -> Vec<MatchRecord> {
    let document = Html::parse_document(html);
    let row_sel = selector("li[data-index]");
    let date_sel = selector(r#"[class*="battle_data_date"]"#);

    let mut records = Vec::new();
    for row in document.select(&row_sel) {
        let Some(date_text) = row.select(&date_sel).next().map(inner_text) else {
            continue;
        };
        let Ok(played_at) = NaiveDateTime::parse_from_str(&date_text, BATTLE_DATE_FORMAT) else {
            continue;
        };

        let p1 = parse_side(row, 1);
        let p2 = parse_side(row, 2);
        let battle_id = format!("rank_{}_{}_{}", digits(&date_text), p1.name, p2.name);

        records.push(MatchRecord {
            battle_id,
            played_at,
            mode: "RankMatch".to_string(),
            p1,
            p2,
        });
    }
    records
}

fn parse_side(row: ElementRef, side: u8) -> PlayerSide {
    let name_sel = selector(&format!(r#"[class*="battle_data_name_p{side}"]"#));
    let block_sel = selector(&format!(r#"[class*="battle_data_player{side}"]"#));
    let result_sel = selector(&format!(r#"[class*="battle_data_player_{side}"]"#));
    let lp_sel = selector(r#"[class*="battle_data_lp"]"#);
    let char_sel = selector(r#"[class*="battle_data_character"] img"#);
    let control_sel = selector(r#"[class*="battle_data_control"] img"#);

    let name = row
        .select(&name_sel)
        .next()
        .map(inner_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let block = row.select(&block_sel).next();

    let rank_points = block
        .and_then(|b| b.select(&lp_sel).next())
        .map(|el| numeric(&inner_text(el)) as i32)
        .unwrap_or(0);

    let character = block
        .and_then(|b| b.select(&char_sel).next())
        .and_then(|img| img.value().attr("alt"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    // The control icon path carries "type0" for classic controls.
    let control = block
        .and_then(|b| b.select(&control_sel).next())
        .and_then(|img| img.value().attr("src"))
        .map(|src| {
            if src.contains("type0") {
                ControlType::Classic
            } else {
                ControlType::Modern
            }
        })
        .unwrap_or(ControlType::Modern);

    let result = row
        .select(&result_sel)
        .next()
        .map(inner_text)
        .unwrap_or_default();

    PlayerSide {
        name,
        character,
        rank_points,
        control,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERFORMANCE_PAGE: &str = r#"
        <html><body>
        <ul>
          <li class="battle_style_item__a1b2c">
            <span class="battle_style_type__x9y8z">ドライブパリィ</span>
            <span class="battle_style_number__q3w4e">21.4%</span>
          </li>
          <li class="battle_style_item__a1b2c">
            <span class="battle_style_type__x9y8z">ドライブインパクト</span>
            <span class="battle_style_number__q3w4e">7.9%</span>
          </li>
          <li class="battle_style_item__a1b2c">
            <span class="battle_style_type__x9y8z">Lv3</span>
            <span class="battle_style_number__q3w4e">64.2%</span>
          </li>
          <li class="battle_style_item__a1b2c">
            <span class="battle_style_type__x9y8z">未知のラベル</span>
            <span class="battle_style_number__q3w4e">99.9%</span>
          </li>
        </ul>
        <dl>
          <dt>ドライブインパクト</dt>
          <dd><span>決めた回数</span><span>3.2</span></dd>
          <dd><span>受けた回数</span><span>1.1</span></dd>
        </dl>
        <dl>
          <dt>投げ</dt>
          <dd><span>決めた回数</span><span>4.5</span></dd>
          <dd><span>投げ抜け回数</span><span>0.8</span></dd>
        </dl>
        </body></html>
    "#;

    #[test]
    fn performance_labels_map_to_fields() {
        let stats = parse_performance(PERFORMANCE_PAGE);
        assert_eq!(stats.d_parry_pct, 21.4);
        assert_eq!(stats.d_impact_pct, 7.9);
        assert_eq!(stats.sa3_pct, 64.2);
        assert_eq!(stats.impact_win, 3.2);
        assert_eq!(stats.impact_lose, 1.1);
        assert_eq!(stats.throw_win, 4.5);
        assert_eq!(stats.throw_escape, 0.8);
    }

    #[test]
    fn missing_labels_default_to_zero() {
        let stats = parse_performance(PERFORMANCE_PAGE);
        assert_eq!(stats.d_reversal_pct, 0.0);
        assert_eq!(stats.just_parry_count, 0.0);
        assert_eq!(stats.stun_win, 0.0);
        assert_eq!(stats.wall_push_sec, 0.0);
    }

    #[test]
    fn empty_page_yields_all_zero() {
        assert_eq!(
            parse_performance("<html><body></body></html>"),
            PerformanceStats::default()
        );
    }

    fn battle_row(date: &str, p1: &str, p2: &str) -> String {
        format!(
            r#"
            <li data-index="0">
              <div class="battle_data_date__k1l2m">{date}</div>
              <span class="battle_data_name_p1__n3o4p">{p1}</span>
              <span class="battle_data_name_p2__n3o4p">{p2}</span>
              <div class="battle_data_player1__r5s6t">
                <span class="battle_data_lp__u7v8w">1,543</span>
                <div class="battle_data_character__z9a0b"><img alt="Ryu" src="/c/ryu.png"></div>
                <div class="battle_data_control__c1d2e"><img src="/icon/type0.png"></div>
              </div>
              <div class="battle_data_player2__r5s6t">
                <span class="battle_data_lp__u7v8w">1498</span>
                <div class="battle_data_character__z9a0b"><img alt="Juri" src="/c/juri.png"></div>
                <div class="battle_data_control__c1d2e"><img src="/icon/type1.png"></div>
              </div>
              <div class="battle_data_player_1__f3g4h">WIN</div>
              <div class="battle_data_player_2__f3g4h">LOSE</div>
            </li>
            "#
        )
    }

    #[test]
    fn battle_rows_parse_both_sides() {
        let html = format!(
            "<html><body><ul>{}</ul></body></html>",
            battle_row("2024/05/12 21:34", "Alpha", "Beta")
        );
        let rows = parse_battle_rows(&html);
        assert_eq!(rows.len(), 1);

        let record = &rows[0];
        assert_eq!(record.battle_id, "rank_202405122134_Alpha_Beta");
        assert_eq!(record.mode, "RankMatch");
        assert_eq!(
            record.played_at,
            NaiveDateTime::parse_from_str("2024/05/12 21:34", BATTLE_DATE_FORMAT).unwrap()
        );
        assert_eq!(record.p1.name, "Alpha");
        assert_eq!(record.p1.rank_points, 1543);
        assert_eq!(record.p1.character, "Ryu");
        assert_eq!(record.p1.control, ControlType::Classic);
        assert_eq!(record.p1.result, "WIN");
        assert_eq!(record.p2.name, "Beta");
        assert_eq!(record.p2.rank_points, 1498);
        assert_eq!(record.p2.control, ControlType::Modern);
        assert_eq!(record.p2.result, "LOSE");
    }

    #[test]
    fn rows_without_parseable_date_are_dropped() {
        let html = format!(
            "<html><body><ul>{}{}</ul></body></html>",
            battle_row("2024/05/12 21:34", "Alpha", "Beta"),
            battle_row("たった今", "Gamma", "Delta")
        );
        let rows = parse_battle_rows(&html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].p1.name, "Alpha");
    }

    #[test]
    fn missing_side_markup_defaults() {
        let html = r#"
            <html><body><ul>
            <li data-index="0">
              <div class="battle_data_date__k1l2m">2024/05/12 21:34</div>
            </li>
            </ul></body></html>
        "#;
        let rows = parse_battle_rows(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].p1.name, "Unknown");
        assert_eq!(rows[0].p1.rank_points, 0);
        assert_eq!(rows[0].p1.character, "Unknown");
        assert_eq!(rows[0].p1.control, ControlType::Modern);
    }
}
