//! Candidate object collection
//!
//! For rules that count objects other than patients, the evaluator asks an
//! [`ObjectCollector`] for the objects of one subject inside the effective
//! period. Every object type has its own query shape; `patients` has none and
//! asking for it is a configuration error.

use crate::provider::{QueryExecutor, Row};
use chrono::NaiveDateTime;
use octofhir_amc_diagnostics::{AmcError, AmcResult};
use octofhir_amc_types::{CandidateObject, FieldValue, ObjectTypeTag, Subject, SubjectId};
use std::collections::HashMap;

/// Fetches the objects of one subject for an object type
pub trait ObjectCollector: Send + Sync {
    /// Objects of `tag` for `subject` dated inside `[begin, end]`
    ///
    /// An inverted range is not rejected; whatever the store returns for it
    /// (normally nothing) is passed through.
    fn collect(
        &self,
        subject: &Subject,
        tag: ObjectTypeTag,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<Vec<CandidateObject>>;
}

const TRANSITIONS_IN_SQL: &str = "SELECT amc_misc_data.map_id AS `encounter`, amc_misc_data.date_completed AS `completed`, form_encounter.date AS `date` \
    FROM `amc_misc_data`, `form_encounter` \
    INNER JOIN openemr_postcalendar_categories opc ON opc.pc_catid = form_encounter.pc_catid \
    WHERE amc_misc_data.map_id = form_encounter.encounter \
    AND amc_misc_data.map_category = 'form_encounter' \
    AND amc_misc_data.pid = ? AND form_encounter.pid = ? \
    AND amc_misc_data.amc_id = 'med_reconc_amc' \
    AND form_encounter.date >= ? AND form_encounter.date <= ? \
    AND ((opc.pc_catname = 'New Patient') OR (opc.pc_catname = 'Established Patient' AND amc_misc_data.soc_provided IS NOT NULL))";

const TRANSITIONS_OUT_SQL: &str = "SELECT transactions.id AS `id` \
    FROM transactions \
    INNER JOIN lbt_data ON lbt_data.form_id = transactions.id \
    WHERE transactions.title = 'LBTref' \
    AND transactions.pid = ? \
    AND lbt_data.field_id = 'refer_date' \
    AND lbt_data.field_value >= ? AND lbt_data.field_value <= ?";

const ENCOUNTERS_SQL: &str = "SELECT * FROM `form_encounter` \
    WHERE `pid` = ? AND `date` >= ? AND `date` <= ?";

const ENCOUNTERS_OFFICE_VISIT_SQL: &str = "SELECT * FROM `form_encounter` \
    LEFT JOIN `enc_category_map` ON (form_encounter.pc_catid = enc_category_map.main_cat_id) \
    WHERE enc_category_map.rule_enc_id = 'enc_off_vis' \
    AND `pid` = ? AND `date` >= ? AND `date` <= ?";

const CPOE_MEDICATIONS_SQL: &str = "SELECT `drug` FROM `prescriptions` \
    WHERE `patient_id` = ? AND `date_added` >= ? AND `date_added` <= ?";

const PRESCRIPTIONS_SQL: &str = "SELECT * FROM `prescriptions` \
    WHERE `patient_id` = ? AND `date_added` >= ? AND `date_added` <= ?";

const LABS_SQL: &str = "SELECT procedure_result.result \
    FROM procedure_order, procedure_report, procedure_result \
    WHERE procedure_order.patient_id = ? \
    AND procedure_order.procedure_order_id = procedure_report.procedure_order_id \
    AND procedure_report.procedure_report_id = procedure_result.procedure_report_id \
    AND procedure_report.date_collected >= ? AND procedure_report.date_collected <= ?";

const IMAGE_ORDERS_SQL: &str = "SELECT pr.* FROM procedure_order pr \
    INNER JOIN procedure_order_code prc ON pr.procedure_order_id = prc.procedure_order_id \
    WHERE pr.patient_id = ? \
    AND prc.procedure_order_title LIKE '%imaging%' \
    AND (pr.date_ordered BETWEEN ? AND ?)";

const LAB_RADIOLOGY_SQL: &str = "SELECT pr.* FROM procedure_order pr \
    INNER JOIN procedure_order_code prc ON pr.procedure_order_id = prc.procedure_order_id \
    LEFT JOIN procedure_providers pp ON pr.lab_id = pp.ppid \
    LEFT JOIN users u ON u.id = pp.lab_director \
    WHERE pr.patient_id = ? \
    AND prc.procedure_order_title LIKE '%imaging%' \
    AND (pr.date_ordered BETWEEN ? AND ?)";

const CPOE_LAB_ORDERS_SQL: &str = "SELECT pr.* FROM procedure_order pr \
    INNER JOIN procedure_order_code prc ON pr.procedure_order_id = prc.procedure_order_id \
    LEFT JOIN procedure_providers pp ON pr.lab_id = pp.ppid \
    LEFT JOIN users u ON u.id = pp.lab_director \
    WHERE pr.patient_id = ? \
    AND prc.procedure_order_title LIKE '%laboratory_test%' \
    AND (pr.date_ordered BETWEEN ? AND ?)";

// erx_source stands in for a CPOE flag the prescriptions table does not carry.
const MED_ORDERS_SQL: &str = "SELECT drug, erx_source AS cpoe_stat FROM `prescriptions` \
    WHERE `patient_id` = ? AND `date_added` BETWEEN ? AND ?";

const LAB_ORDERS_SQL: &str = "SELECT prc.* FROM procedure_order pr \
    INNER JOIN procedure_order_code prc ON pr.procedure_order_id = prc.procedure_order_id \
    WHERE pr.patient_id = ? \
    AND (prc.procedure_order_title LIKE '%Laboratory%' OR (prc.procedure_source = 2 AND prc.procedure_order_title IS NULL)) \
    AND (pr.date_ordered BETWEEN ? AND ?)";

/// Secondary lookup merging layout-based form fields into a referral record
pub const TRANSITION_FIELDS_SQL: &str =
    "SELECT field_id, field_value FROM lbt_data WHERE form_id = ?";

/// A parameterized query selecting the objects of one type for one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectQuery {
    pub sql: &'static str,
    pub params: Vec<FieldValue>,
}

impl ObjectQuery {
    /// Query shape for a tag, bound to a subject and an inclusive date range
    pub fn for_tag(
        tag: ObjectTypeTag,
        subject_id: &SubjectId,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<Self> {
        let pid = FieldValue::text(subject_id.as_str());
        let (begin, end) = (FieldValue::DateTime(begin), FieldValue::DateTime(end));

        let sql = match tag {
            ObjectTypeTag::Patients => return Err(AmcError::no_collection_query(tag)),
            ObjectTypeTag::TransitionsIn => {
                return Ok(Self {
                    sql: TRANSITIONS_IN_SQL,
                    params: vec![pid.clone(), pid, begin, end],
                });
            }
            ObjectTypeTag::TransitionsOut => TRANSITIONS_OUT_SQL,
            ObjectTypeTag::Encounters => ENCOUNTERS_SQL,
            ObjectTypeTag::EncountersOfficeVisit => ENCOUNTERS_OFFICE_VISIT_SQL,
            ObjectTypeTag::CpoeMedications => CPOE_MEDICATIONS_SQL,
            ObjectTypeTag::Prescriptions => PRESCRIPTIONS_SQL,
            ObjectTypeTag::Labs => LABS_SQL,
            ObjectTypeTag::ImageOrders => IMAGE_ORDERS_SQL,
            ObjectTypeTag::LabRadiology => LAB_RADIOLOGY_SQL,
            ObjectTypeTag::CpoeLabOrders => CPOE_LAB_ORDERS_SQL,
            ObjectTypeTag::MedOrders => MED_ORDERS_SQL,
            ObjectTypeTag::LabOrders => LAB_ORDERS_SQL,
        };

        Ok(Self {
            sql,
            params: vec![pid, begin, end],
        })
    }
}

/// Object collector backed by the data store
pub struct SqlObjectCollector<E> {
    executor: E,
}

impl<E: QueryExecutor> SqlObjectCollector<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Merge the referral's form fields into the record, one lookup per record
    fn attach_transition_fields(&self, row: &mut Row) -> AmcResult<()> {
        let id = row
            .get("id")
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| AmcError::malformed_row("transition record without id"))?;

        for field in self.executor.query(TRANSITION_FIELDS_SQL, &[id])? {
            let name = match field.get("field_id") {
                Some(FieldValue::Text(name)) => name.clone(),
                _ => return Err(AmcError::malformed_row("transition field without field_id")),
            };
            let value = field.get("field_value").cloned().unwrap_or_default();
            row.insert(name, value);
        }
        Ok(())
    }
}

impl<E: QueryExecutor> ObjectCollector for SqlObjectCollector<E> {
    fn collect(
        &self,
        subject: &Subject,
        tag: ObjectTypeTag,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<Vec<CandidateObject>> {
        let query = ObjectQuery::for_tag(tag, subject.id(), begin, end)?;
        let mut rows = self
            .executor
            .query(query.sql, &query.params)
            .map_err(|e| AmcError::from(e).with_subject(subject.id().as_str()))?;

        if tag == ObjectTypeTag::TransitionsOut {
            for row in &mut rows {
                self.attach_transition_fields(row)
                    .map_err(|e| e.with_subject(subject.id().as_str()))?;
            }
        }

        log::trace!("collected {} {} objects for subject {}", rows.len(), tag, subject.id());
        Ok(rows.into_iter().map(CandidateObject::from).collect())
    }
}

/// Object collector over dated objects held in memory
///
/// Objects are returned in insertion order when their date falls inside the
/// inclusive range.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectCollector {
    objects: HashMap<(SubjectId, ObjectTypeTag), Vec<(NaiveDateTime, CandidateObject)>>,
}

impl InMemoryObjectCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object dated `date` for a subject
    pub fn add(
        &mut self,
        subject_id: impl Into<SubjectId>,
        tag: ObjectTypeTag,
        date: NaiveDateTime,
        object: CandidateObject,
    ) -> AmcResult<()> {
        if tag.is_patients() {
            return Err(AmcError::no_collection_query(tag));
        }
        self.objects
            .entry((subject_id.into(), tag))
            .or_default()
            .push((date, object));
        Ok(())
    }

    /// Builder form of [`add`](Self::add)
    pub fn with(
        mut self,
        subject_id: impl Into<SubjectId>,
        tag: ObjectTypeTag,
        date: NaiveDateTime,
        object: CandidateObject,
    ) -> AmcResult<Self> {
        self.add(subject_id, tag, date, object)?;
        Ok(self)
    }
}

impl ObjectCollector for InMemoryObjectCollector {
    fn collect(
        &self,
        subject: &Subject,
        tag: ObjectTypeTag,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<Vec<CandidateObject>> {
        if tag.is_patients() {
            return Err(AmcError::no_collection_query(tag));
        }

        Ok(self
            .objects
            .get(&(subject.id().clone(), tag))
            .map(|objects| {
                objects
                    .iter()
                    .filter(|(date, _)| *date >= begin && *date <= end)
                    .map(|(_, object)| object.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
